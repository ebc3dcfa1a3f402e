//! Default implementations for the engine's pluggable traits.
//!
//! These defaults let the engine start with zero external configuration.
//! Each can be replaced via the Engine builder.

pub mod in_memory_definitions;
pub mod in_memory_session_store;
pub mod unconfigured;

pub use in_memory_definitions::InMemoryDefinitions;
pub use in_memory_session_store::InMemorySessionStore;
pub use unconfigured::{UnconfiguredGenerationBackend, UnconfiguredQueryBackend};
