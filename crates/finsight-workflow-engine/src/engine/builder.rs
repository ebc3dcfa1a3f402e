//! Engine builder, assembling collaborators with in-memory defaults.

use std::sync::Arc;

use super::Engine;
use crate::defaults::{
    InMemoryDefinitions, InMemorySessionStore, UnconfiguredGenerationBackend,
    UnconfiguredQueryBackend,
};
use crate::executor::ExecutorConfig;
use crate::traits::{
    DefinitionSource, GenerationBackend, NoopProgressSink, ProgressSink, QueryBackend,
    SessionStore,
};

/// Builder for assembling the [`Engine`].
///
/// Every collaborator is optional. The defaults applied in
/// [`build()`](EngineBuilder::build) keep a fresh engine runnable with zero
/// configuration: in-memory definition and session stores, a no-op progress
/// sink, and backends that fail any node needing them with a clear message.
///
/// Collaborators are taken as `Arc` so the caller can keep a handle, e.g.
/// to register definitions after the engine is built.
pub struct EngineBuilder {
    definitions: Option<Arc<dyn DefinitionSource>>,
    store: Option<Arc<dyn SessionStore>>,
    sink: Option<Arc<dyn ProgressSink>>,
    query: Option<Arc<dyn QueryBackend>>,
    generation: Option<Arc<dyn GenerationBackend>>,
    config: ExecutorConfig,
}

impl EngineBuilder {
    pub(super) fn new() -> Self {
        Self {
            definitions: None,
            store: None,
            sink: None,
            query: None,
            generation: None,
            config: ExecutorConfig::default(),
        }
    }

    /// Set the workflow-definition source. Default: [`InMemoryDefinitions`].
    pub fn definitions(mut self, source: Arc<dyn DefinitionSource>) -> Self {
        self.definitions = Some(source);
        self
    }

    /// Set the session store. Default: [`InMemorySessionStore`].
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the progress sink. Default: [`NoopProgressSink`].
    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the query backend. Default: [`UnconfiguredQueryBackend`], which
    /// fails any `data_source` node.
    pub fn query_backend(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.query = Some(backend);
        self
    }

    /// Set the generation backend. Default:
    /// [`UnconfiguredGenerationBackend`], which fails any `prompt` node.
    pub fn generation_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.generation = Some(backend);
        self
    }

    /// Set the executor configuration.
    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the engine, applying defaults for any unset collaborator.
    pub fn build(self) -> Engine {
        Engine {
            definitions: self
                .definitions
                .unwrap_or_else(|| Arc::new(InMemoryDefinitions::new())),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoopProgressSink)),
            query: self
                .query
                .unwrap_or_else(|| Arc::new(UnconfiguredQueryBackend)),
            generation: self
                .generation
                .unwrap_or_else(|| Arc::new(UnconfiguredGenerationBackend)),
            config: Arc::new(self.config),
        }
    }
}
