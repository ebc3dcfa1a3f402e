//! Engine facade: the single entry point for embedding the workflow engine.
//!
//! The [`Engine`] assembles the collaborators (definition source, session
//! store, progress sink, query and generation backends) and starts runs.
//! Construct via [`Engine::builder()`].
//!
//! ```rust,ignore
//! let definitions = Arc::new(InMemoryDefinitions::new());
//! definitions.insert(my_workflow()).await;
//!
//! let engine = Engine::builder()
//!     .definitions(definitions.clone())
//!     .query_backend(Arc::new(MockWarehouse::realistic()))
//!     .build();
//!
//! let handle = engine.execute("daily-brief", json!({"ticker": "ACME"})).await?;
//! let outcome = handle.wait().await;
//! ```

mod builder;
pub mod error;

pub use builder::EngineBuilder;
pub use error::EngineError;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::executor::{drive_run, ExecutionHandle, ExecutorConfig, RunParams};
use crate::progress::{ProgressEmitter, ProgressPump};
use crate::runtime::SessionTracker;
use crate::traits::{
    DefinitionSource, GenerationBackend, ProgressSink, QueryBackend, SessionStore,
};
use crate::types::{
    ExecutionSession, NodeResult, SessionFilter, SessionPage, WorkflowDefinition,
};
use crate::validate::validate_workflow;

/// The assembled engine.
///
/// Cheap to share: every collaborator is behind an `Arc`, so callers can
/// clone the handles they passed to the builder and keep using them (for
/// example to register definitions after construction).
pub struct Engine {
    pub(super) definitions: Arc<dyn DefinitionSource>,
    pub(super) store: Arc<dyn SessionStore>,
    pub(super) sink: Arc<dyn ProgressSink>,
    pub(super) query: Arc<dyn QueryBackend>,
    pub(super) generation: Arc<dyn GenerationBackend>,
    pub(super) config: Arc<ExecutorConfig>,
}

impl Engine {
    /// Create a new [`EngineBuilder`].
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Execute a workflow by id.
    ///
    /// Resolves the definition through the configured
    /// [`DefinitionSource`], then behaves like
    /// [`execute_definition`](Engine::execute_definition).
    pub async fn execute(
        &self,
        workflow_id: &str,
        input: Value,
    ) -> Result<ExecutionHandle, EngineError> {
        let definition = self.definitions.load_definition(workflow_id).await?;
        self.execute_definition(definition, input).await
    }

    /// Execute a caller-supplied definition directly.
    ///
    /// The definition is validated first; any [`ValidationError`] rejects
    /// the call before a session exists, so invalid submissions leave no
    /// trace in the store. Warnings are logged and the run proceeds.
    ///
    /// Returns immediately with an [`ExecutionHandle`] for live event
    /// streaming, cancellation, and awaiting the outcome. The run itself
    /// continues on a spawned task whether or not the handle is kept.
    ///
    /// [`ValidationError`]: crate::validate::ValidationError
    pub async fn execute_definition(
        &self,
        definition: WorkflowDefinition,
        input: Value,
    ) -> Result<ExecutionHandle, EngineError> {
        let report = validate_workflow(&definition);
        for warning in &report.warnings {
            tracing::warn!(
                workflow_id = definition.id.as_str(),
                "definition warning: {warning}"
            );
        }
        if !report.is_ok() {
            return Err(EngineError::InvalidDefinition {
                workflow_id: definition.id.clone(),
                errors: report.errors,
            });
        }

        let tracker = SessionTracker::begin(self.store.clone(), &definition.id, &input).await?;
        let session_id = tracker.session_id().to_string();

        let (emitter, rx) = ProgressEmitter::channel(self.config.progress_capacity);
        let (broadcast_tx, _) = broadcast::channel(self.config.progress_capacity);
        // The pump outlives the handle if needed; it exits on its own once
        // the run loop drops the emitter and the channel drains.
        ProgressPump::new(rx, self.sink.clone(), broadcast_tx.clone()).spawn();

        let cancel = CancellationToken::new();
        let join = tokio::spawn(drive_run(RunParams {
            definition: Arc::new(definition),
            tracker,
            input,
            query: self.query.clone(),
            generation: self.generation.clone(),
            emitter,
            config: self.config.clone(),
            cancel: cancel.clone(),
        }));

        Ok(ExecutionHandle::new(session_id, broadcast_tx, cancel, join))
    }

    /// Fetch one session by id, live or finished.
    pub async fn session(
        &self,
        session_id: &str,
    ) -> Result<Option<ExecutionSession>, EngineError> {
        Ok(self.store.get_session(session_id).await?)
    }

    /// All recorded node results for a session, in dispatch order.
    pub async fn node_results(&self, session_id: &str) -> Result<Vec<NodeResult>, EngineError> {
        Ok(self.store.list_node_results(session_id).await?)
    }

    /// Page through sessions, newest first.
    pub async fn sessions(&self, filter: &SessionFilter) -> Result<SessionPage, EngineError> {
        Ok(self.store.list_sessions(filter).await?)
    }
}
