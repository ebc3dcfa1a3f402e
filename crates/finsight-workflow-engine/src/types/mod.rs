//! Foundational types for the workflow execution model.
//!
//! Every type here is `Serialize + Deserialize + Debug + Clone`. Map fields
//! use `BTreeMap` (never `HashMap`) to guarantee deterministic
//! serialization of definitions and snapshots. This is a correctness
//! invariant, not a style choice.

pub mod execution;
pub mod graph;

pub use execution::*;
pub use graph::*;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Current schema version for WorkflowDefinition serialization.
pub const WORKFLOW_SCHEMA_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// The closed set of node behaviors the engine knows how to execute.
///
/// Deliberately **not** `#[non_exhaustive]`: dispatch is an exhaustive
/// `match`, and a definition naming an unknown kind must fail at
/// deserialization, before a run ever starts. Adding a kind means adding
/// an executor, which is a breaking change by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// No-op entry marker. Has no inputs; forwards the initial input.
    Start,
    /// Runs a query against the data-source collaborator.
    DataSource,
    /// Pure, deterministic data shaping.
    Transform,
    /// Text template with `{{placeholder}}` substitution.
    Template,
    /// Sends assembled text to the generation collaborator.
    Prompt,
    /// Terminal formatting step; passes its input through unmodified.
    Output,
    /// No-op exit marker. Never writes to the run context.
    End,
}

impl NodeKind {
    /// Whether a node of this kind stores its output in the run context.
    /// `end` nodes declare no outputs and never write.
    pub fn writes_output(&self) -> bool {
        !matches!(self, NodeKind::End)
    }

    /// Wire name, also used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::DataSource => "data_source",
            NodeKind::Transform => "transform",
            NodeKind::Template => "template",
            NodeKind::Prompt => "prompt",
            NodeKind::Output => "output",
            NodeKind::End => "end",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node errors
// ---------------------------------------------------------------------------

/// Per-node failure taxonomy.
///
/// These are data, not control flow: a failing node's error is captured
/// into its [`NodeResult`](crate::types::NodeResult) and never crosses a
/// node boundary as a panic or early return of the run loop. Serialized
/// with a `kind` tag so stored results stay queryable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
#[non_exhaustive]
pub enum NodeError {
    /// Node configuration failed to parse or is semantically invalid.
    Validation { message: String },
    /// A required input key was absent from the run context.
    MissingRequiredInput { key: String },
    /// The data-source collaborator failed. Carries the raw backend message.
    DataSource { message: String },
    /// A transform failed. `input` is the offending value, kept for
    /// diagnostics.
    Transform {
        message: String,
        input: serde_json::Value,
    },
    /// The generation collaborator failed.
    Generation { message: String },
    /// The node exceeded its execution deadline.
    Timeout { elapsed_ms: u64 },
    /// The run was cancelled while this node was in flight.
    Cancelled,
    /// Engine-side fault, e.g. a panicked node task. Not reachable from
    /// executor code.
    Internal { message: String },
}

impl NodeError {
    /// Transient failures the coordinator may retry. Validation and input
    /// errors are deterministic and never retried; cancellation is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NodeError::DataSource { .. } | NodeError::Generation { .. } | NodeError::Timeout { .. }
        )
    }
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { message } => write!(f, "validation: {message}"),
            Self::MissingRequiredInput { key } => write!(f, "missing required input: {key}"),
            Self::DataSource { message } => write!(f, "data source error: {message}"),
            Self::Transform { message, .. } => write!(f, "transform error: {message}"),
            Self::Generation { message } => write!(f, "generation error: {message}"),
            Self::Timeout { elapsed_ms } => write!(f, "timeout after {elapsed_ms}ms"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for NodeError {}

// ---------------------------------------------------------------------------
// Execution tuning
// ---------------------------------------------------------------------------

/// Retry policy with exponential backoff, applied by the run coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryPolicy {
    /// Total attempts (1 = no retry). Default: 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff in milliseconds. Default: 1000.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Backoff multiplier per attempt. Default: 2.0.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}
fn default_backoff_ms() -> u64 {
    1_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Execution tuning parsed from the reserved node-config fields
/// `timeout_ms` and `retry`. Unknown config fields are the node kind's
/// business and are ignored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionHints {
    /// Overrides the kind's default timeout when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl ExecutionHints {
    /// Extract hints from a node's config value. A null or non-object
    /// config yields the defaults; a malformed `retry` block is a
    /// configuration error surfaced to the caller.
    pub fn from_config(config: &serde_json::Value) -> Result<Self, NodeError> {
        if !config.is_object() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.clone()).map_err(|e| NodeError::Validation {
            message: format!("invalid execution hints: {e}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
