//! Session and per-node execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NodeError;

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Lifecycle status of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    /// A session is terminal once its status leaves `running`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending | SessionStatus::Running)
    }
}

/// Lifecycle status of one node within a session.
///
/// `pending -> running -> {succeeded | failed}`; `skipped` is reachable
/// only from `pending`, when an ancestor failed or the run was cancelled
/// before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Succeeded | NodeStatus::Failed | NodeStatus::Skipped
        )
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Succeeded => "succeeded",
            NodeStatus::Failed => "failed",
            NodeStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Session record
// ---------------------------------------------------------------------------

/// One execution of a workflow definition.
///
/// Created when the coordinator accepts a run; mutated only by the
/// coordinator; terminal once `status` leaves `running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionSession {
    pub id: String,
    pub workflow_id: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Initial context seed supplied by the caller.
    #[serde(default)]
    pub input: serde_json::Value,
    /// Set on failure: the first failing node in dispatch order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionFailure>,
}

impl ExecutionSession {
    /// Fresh pending session with a random v4 id.
    pub fn new(workflow_id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            status: SessionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            input,
            error: None,
        }
    }
}

/// The failure that decided a session's `failed` status. When several
/// branches fail concurrently, this is the one dispatched earliest; all
/// failures remain on their own node results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionFailure {
    pub node_id: String,
    pub error: NodeError,
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node `{}`: {}", self.node_id, self.error)
    }
}

// ---------------------------------------------------------------------------
// Node results
// ---------------------------------------------------------------------------

/// Execution record for one node within one session.
///
/// Created when the node is dispatched (status `running`), upserted once
/// on completion, immutable after that. Skipped nodes get a record with no
/// timestamps or snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NodeResult {
    pub node_id: String,
    pub status: NodeStatus,
    /// Snapshot of the resolved input bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    /// Executor invocations, counting retries. 0 for skipped nodes.
    #[serde(default)]
    pub attempts: u32,
    /// Advisory conditions collected during execution, e.g. unresolved
    /// template placeholders.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl NodeResult {
    /// Record for a node that just entered `running`.
    pub fn running(node_id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Running,
            input: Some(input),
            output: None,
            error: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            execution_time_ms: None,
            attempts: 1,
            warnings: Vec::new(),
        }
    }

    /// Record for a node skipped before dispatch.
    pub fn skipped(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Skipped,
            input: None,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
            execution_time_ms: None,
            attempts: 0,
            warnings: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session listing
// ---------------------------------------------------------------------------

/// Filter for session listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            workflow_id: None,
            status: None,
            offset: 0,
            limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    50
}

/// One page of sessions, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionPage {
    pub sessions: Vec<ExecutionSession>,
    /// Total matching the filter, ignoring paging.
    pub total: usize,
}
