//! finsight workflow engine: DAG execution for analysis pipelines.
//!
//! This crate provides the types, collaborator traits, and runtime for
//! executing directed-acyclic workflow graphs: data-source queries,
//! transforms, templates, and prompt calls, with per-node results and
//! progress events persisted through pluggable stores.
//!
//! The engine is designed to be embedded. It has no opinion on transport
//! or storage: HTTP servers, databases, and LLM providers live behind the
//! traits in [`traits`], with in-memory defaults in [`defaults`] so a
//! zero-config engine still runs.

pub mod context;
pub mod defaults;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod node_ctx;
pub mod nodes;
pub mod progress;
pub(crate) mod runtime;
pub mod traits;
pub mod types;
pub mod validate;

// Re-export public types at the crate level.

// context
pub use context::{ContextStore, INPUT_KEY};

// defaults
pub use defaults::{
    InMemoryDefinitions, InMemorySessionStore, UnconfiguredGenerationBackend,
    UnconfiguredQueryBackend,
};

// engine
pub use engine::{Engine, EngineBuilder, EngineError};

// errors
pub use errors::{
    DefinitionError, GenerationBackendError, ProgressSinkError, QueryBackendError,
    SessionStoreError,
};

// executor
pub use executor::{ExecutionHandle, ExecutorConfig, RunOutcome};

// node_ctx
pub use node_ctx::NodeCtx;

// progress
pub use progress::ProgressEvent;

// traits
pub use traits::{
    DefinitionSource, GenerationBackend, GenerationParams, NoopProgressSink, ProgressSink,
    QueryBackend, SessionStore,
};

// types
pub use types::{
    Edge, ExecutionHints, ExecutionSession, Node, NodeError, NodeKind, NodeResult, NodeStatus,
    RetryPolicy, SessionFailure, SessionFilter, SessionPage, SessionStatus, WorkflowDefinition,
    WORKFLOW_SCHEMA_VERSION,
};

// validate
pub use validate::{validate_workflow, ValidationError, ValidationReport, ValidationWarning};
