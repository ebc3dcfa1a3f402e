//! Collaborator traits: the engine's boundary with excluded subsystems.
//!
//! Each trait is a data contract only. A concrete implementation may be an
//! in-process call, JSON-over-HTTP, or a message queue; the engine does not
//! care. In-memory defaults live in [`crate::defaults`], deterministic test
//! backends in the `finsight-connectors` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{
    DefinitionError, GenerationBackendError, ProgressSinkError, QueryBackendError,
    SessionStoreError,
};
use crate::progress::ProgressEvent;
use crate::types::{
    ExecutionSession, NodeResult, SessionFailure, SessionFilter, SessionPage, SessionStatus,
    WorkflowDefinition,
};

// ---------------------------------------------------------------------------
// Data-source collaborator
// ---------------------------------------------------------------------------

/// External query execution for `data_source` nodes.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute `query_text` against the connection named by
    /// `connection_ref`, with positional parameters. Rows come back as
    /// JSON objects, one per record.
    async fn run_query(
        &self,
        connection_ref: &str,
        query_text: &str,
        params: &[Value],
    ) -> Result<Vec<Value>, QueryBackendError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Generation collaborator
// ---------------------------------------------------------------------------

/// Sampling and budget controls forwarded to the generation collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Token budget for the completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// External text generation for `prompt` nodes.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send `prompt_text` to the provider and return the raw completion.
    /// The engine never parses the result; downstream transforms do.
    async fn generate(
        &self,
        prompt_text: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationBackendError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Persistence collaborator
// ---------------------------------------------------------------------------

/// Persistence for sessions and per-node results.
///
/// The coordinator is the only writer during a run. Reads may happen
/// concurrently from observers polling run progress.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate and persist a new pending session, returning its id.
    async fn create_session(
        &self,
        workflow_id: &str,
        input: &Value,
    ) -> Result<String, SessionStoreError>;

    /// Upsert the result for `(session_id, result.node_id)`. Called once
    /// when the node starts running and again with the terminal record.
    async fn record_node_result(
        &self,
        session_id: &str,
        result: &NodeResult,
    ) -> Result<(), SessionStoreError>;

    /// Update session status. Implementations set `completed_at` when the
    /// status is terminal.
    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        error: Option<SessionFailure>,
    ) -> Result<(), SessionStoreError>;

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ExecutionSession>, SessionStoreError>;

    /// All recorded node results for a session, in dispatch order.
    async fn list_node_results(
        &self,
        session_id: &str,
    ) -> Result<Vec<NodeResult>, SessionStoreError>;

    /// Page through sessions, newest first.
    async fn list_sessions(&self, filter: &SessionFilter)
        -> Result<SessionPage, SessionStoreError>;
}

// ---------------------------------------------------------------------------
// Push-notification collaborator
// ---------------------------------------------------------------------------

/// Push transport for progress events. Fire-and-forget: delivery is
/// at-most-once, and a failing sink never affects run correctness.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, event: ProgressEvent) -> Result<(), ProgressSinkError>;
}

/// Sink that discards every event. The default when no push transport is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressSink;

#[async_trait]
impl ProgressSink for NoopProgressSink {
    async fn publish(&self, _event: ProgressEvent) -> Result<(), ProgressSinkError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Workflow-definition source
// ---------------------------------------------------------------------------

/// Read-only source of workflow definitions.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn load_definition(
        &self,
        workflow_id: &str,
    ) -> Result<WorkflowDefinition, DefinitionError>;
}
