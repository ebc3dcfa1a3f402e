//! Session lifecycle bookkeeping against the session store.

use std::sync::Arc;

use serde_json::Value;

use crate::errors::SessionStoreError;
use crate::traits::SessionStore;
use crate::types::{NodeResult, SessionFailure, SessionStatus};

/// Persists session transitions on behalf of the run loop.
///
/// `begin` is the only store call allowed to fail the run: without a
/// session record there is nothing to record against. Every later write is
/// best-effort; a flaky store degrades observability, never correctness.
pub(crate) struct SessionTracker {
    store: Arc<dyn SessionStore>,
    session_id: String,
    finished: bool,
}

impl SessionTracker {
    /// Create and persist a new pending session.
    pub(crate) async fn begin(
        store: Arc<dyn SessionStore>,
        workflow_id: &str,
        input: &Value,
    ) -> Result<Self, SessionStoreError> {
        let session_id = store.create_session(workflow_id, input).await?;
        Ok(Self {
            store,
            session_id,
            finished: false,
        })
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Mark the session running. Called once when the run loop takes over.
    pub(crate) async fn started(&self) {
        if let Err(err) = self
            .store
            .update_session_status(&self.session_id, SessionStatus::Running, None)
            .await
        {
            tracing::warn!(
                session_id = %self.session_id,
                error = %err,
                "failed to mark session running"
            );
        }
    }

    /// Upsert one node result.
    pub(crate) async fn record_node_result(&self, result: &NodeResult) {
        if let Err(err) = self
            .store
            .record_node_result(&self.session_id, result)
            .await
        {
            tracing::warn!(
                session_id = %self.session_id,
                node_id = %result.node_id,
                error = %err,
                "failed to record node result"
            );
        }
    }

    /// Write the terminal status and disarm the drop guard.
    pub(crate) async fn finish(mut self, status: SessionStatus, error: Option<SessionFailure>) {
        self.finished = true;
        if let Err(err) = self
            .store
            .update_session_status(&self.session_id, status, error)
            .await
        {
            tracing::warn!(
                session_id = %self.session_id,
                error = %err,
                "failed to record terminal session status"
            );
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Abandoned without a terminal write, e.g. the coordinator task
        // panicked or its handle was dropped. Leave a failed marker so the
        // session cannot sit in `running` forever.
        tracing::warn!(
            session_id = %self.session_id,
            "session tracker dropped without finish, marking session failed"
        );
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            let store = Arc::clone(&self.store);
            let session_id = self.session_id.clone();
            rt.spawn(async move {
                let _ = store
                    .update_session_status(&session_id, SessionStatus::Failed, None)
                    .await;
            });
        }
    }
}
