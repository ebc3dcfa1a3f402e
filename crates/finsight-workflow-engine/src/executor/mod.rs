//! Graph executor.
//!
//! Runs workflow definitions as tokio task DAGs: barrier dispatch in
//! definition order, per-node retry and timeout, cooperative cancellation,
//! and skip propagation past failed branches. Every node state change is
//! persisted through the session store and mirrored as a progress event.

mod node;
mod run;
mod schedule;

use std::collections::BTreeMap;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressEvent;
use crate::types::{NodeKind, SessionStatus};

pub use run::RunOutcome;
pub(crate) use run::{drive_run, RunParams};

/// Timeouts and channel sizing for the run loop.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-attempt timeout for kinds without a dedicated default.
    pub default_timeout_ms: u64,
    /// Per-attempt timeout for `data_source` nodes.
    pub data_source_timeout_ms: u64,
    /// Per-attempt timeout for `prompt` nodes. Generation is slow.
    pub prompt_timeout_ms: u64,
    /// Capacity of the progress channel and its broadcast mirror.
    pub progress_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            data_source_timeout_ms: 60_000,
            prompt_timeout_ms: 120_000,
            progress_capacity: 256,
        }
    }
}

impl ExecutorConfig {
    /// Kind-specific per-attempt timeout, used when the node config sets
    /// none.
    pub fn timeout_for(&self, kind: NodeKind) -> u64 {
        match kind {
            NodeKind::DataSource => self.data_source_timeout_ms,
            NodeKind::Prompt => self.prompt_timeout_ms,
            _ => self.default_timeout_ms,
        }
    }
}

/// Handle to a running session.
///
/// Dropping the handle detaches it; the run keeps going and its records
/// keep landing in the session store.
pub struct ExecutionHandle {
    session_id: String,
    events: broadcast::Sender<ProgressEvent>,
    cancel: CancellationToken,
    join: JoinHandle<RunOutcome>,
}

impl ExecutionHandle {
    pub(crate) fn new(
        session_id: String,
        events: broadcast::Sender<ProgressEvent>,
        cancel: CancellationToken,
        join: JoinHandle<RunOutcome>,
    ) -> Self {
        Self {
            session_id,
            events,
            cancel,
            join,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Subscribe to live progress events. Late subscribers miss whatever
    /// was broadcast before the call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Request cooperative cancellation. Idempotent. The run drains its
    /// in-flight nodes and finishes with the cancelled status.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> RunOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    session_id = self.session_id.as_str(),
                    error = %err,
                    "run task aborted"
                );
                RunOutcome {
                    session_id: self.session_id,
                    status: SessionStatus::Failed,
                    error: None,
                    context: BTreeMap::new(),
                }
            }
        }
    }
}

impl std::fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_timeouts_resolve_from_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.timeout_for(NodeKind::DataSource), 60_000);
        assert_eq!(config.timeout_for(NodeKind::Prompt), 120_000);
        assert_eq!(config.timeout_for(NodeKind::Transform), 30_000);
        assert_eq!(config.timeout_for(NodeKind::Start), 30_000);
    }

    #[tokio::test]
    async fn handle_wait_returns_the_outcome() {
        let (tx, _) = broadcast::channel(8);
        let join = tokio::spawn(async {
            RunOutcome {
                session_id: "sess-1".into(),
                status: SessionStatus::Completed,
                error: None,
                context: BTreeMap::new(),
            }
        });
        let handle = ExecutionHandle::new("sess-1".into(), tx, CancellationToken::new(), join);
        assert_eq!(handle.session_id(), "sess-1");
        let outcome = handle.wait().await;
        assert_eq!(outcome.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn handle_wait_survives_an_aborted_run_task() {
        let (tx, _) = broadcast::channel(8);
        let join: JoinHandle<RunOutcome> =
            tokio::spawn(async { std::future::pending::<RunOutcome>().await });
        join.abort();
        let handle = ExecutionHandle::new("sess-2".into(), tx, CancellationToken::new(), join);
        let outcome = handle.wait().await;
        assert_eq!(outcome.status, SessionStatus::Failed);
        assert_eq!(outcome.session_id, "sess-2");
    }
}
