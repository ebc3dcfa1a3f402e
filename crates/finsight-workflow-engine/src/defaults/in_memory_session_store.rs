//! In-memory session store for testing and lightweight usage.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::SessionStoreError;
use crate::traits::SessionStore;
use crate::types::{
    ExecutionSession, NodeResult, SessionFailure, SessionFilter, SessionPage, SessionStatus,
};

/// In-memory implementation of [`SessionStore`].
///
/// Uses `BTreeMap` for deterministic iteration order (project convention).
/// Node results keep their insertion order, which is the dispatch order
/// because the coordinator records a `running` row before anything else
/// touches the node.
pub struct InMemorySessionStore {
    sessions: RwLock<BTreeMap<String, ExecutionSession>>,
    results: RwLock<BTreeMap<String, Vec<NodeResult>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            results: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        workflow_id: &str,
        input: &Value,
    ) -> Result<String, SessionStoreError> {
        let session = ExecutionSession::new(workflow_id, input.clone());
        let id = session.id.clone();
        self.sessions.write().await.insert(id.clone(), session);
        self.results.write().await.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn record_node_result(
        &self,
        session_id: &str,
        result: &NodeResult,
    ) -> Result<(), SessionStoreError> {
        let mut guard = self.results.write().await;
        let rows = guard.get_mut(session_id).ok_or_else(|| {
            SessionStoreError::NotFound {
                id: session_id.to_string(),
            }
        })?;
        match rows.iter_mut().find(|r| r.node_id == result.node_id) {
            Some(existing) => *existing = result.clone(),
            None => rows.push(result.clone()),
        }
        Ok(())
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        error: Option<SessionFailure>,
    ) -> Result<(), SessionStoreError> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(session_id).ok_or_else(|| {
            SessionStoreError::NotFound {
                id: session_id.to_string(),
            }
        })?;
        session.status = status;
        if let Some(failure) = error {
            session.error = Some(failure);
        }
        if status.is_terminal() {
            session.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ExecutionSession>, SessionStoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn list_node_results(
        &self,
        session_id: &str,
    ) -> Result<Vec<NodeResult>, SessionStoreError> {
        Ok(self
            .results
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
    ) -> Result<SessionPage, SessionStoreError> {
        let guard = self.sessions.read().await;
        let mut sessions: Vec<ExecutionSession> = guard
            .values()
            .filter(|s| {
                if let Some(ref wf) = filter.workflow_id {
                    if s.workflow_id != *wf {
                        return false;
                    }
                }
                if let Some(status) = filter.status {
                    if s.status != status {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let total = sessions.len();
        let sessions = sessions
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();

        Ok(SessionPage { sessions, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeStatus;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemorySessionStore::new();
        let id = store
            .create_session("wf-1", &json!({"ticker": "ACME"}))
            .await
            .unwrap();

        let session = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.workflow_id, "wf-1");
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.input, json!({"ticker": "ACME"}));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemorySessionStore::new();
        assert!(store.get_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_node_result_upsert_keeps_dispatch_order() {
        let store = InMemorySessionStore::new();
        let id = store.create_session("wf-1", &json!(null)).await.unwrap();

        store
            .record_node_result(&id, &NodeResult::running("fetch", json!(null)))
            .await
            .unwrap();
        store
            .record_node_result(&id, &NodeResult::running("report", json!(null)))
            .await
            .unwrap();

        // Terminal upsert for the first node must not reorder.
        let mut done = NodeResult::running("fetch", json!(null));
        done.status = NodeStatus::Succeeded;
        done.output = Some(json!([1, 2]));
        store.record_node_result(&id, &done).await.unwrap();

        let rows = store.list_node_results(&id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].node_id, "fetch");
        assert_eq!(rows[0].status, NodeStatus::Succeeded);
        assert_eq!(rows[1].node_id, "report");
    }

    #[tokio::test]
    async fn test_record_against_unknown_session_fails() {
        let store = InMemorySessionStore::new();
        let err = store
            .record_node_result("nope", &NodeResult::skipped("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionStoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_terminal_status_sets_completed_at() {
        let store = InMemorySessionStore::new();
        let id = store.create_session("wf-1", &json!(null)).await.unwrap();

        store
            .update_session_status(&id, SessionStatus::Running, None)
            .await
            .unwrap();
        let session = store.get_session(&id).await.unwrap().unwrap();
        assert!(session.completed_at.is_none());

        store
            .update_session_status(&id, SessionStatus::Completed, None)
            .await
            .unwrap();
        let session = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_list_sessions_filters_and_pages() {
        let store = InMemorySessionStore::new();
        for _ in 0..3 {
            store.create_session("wf-a", &json!(null)).await.unwrap();
        }
        let failed_id = store.create_session("wf-b", &json!(null)).await.unwrap();
        store
            .update_session_status(&failed_id, SessionStatus::Failed, None)
            .await
            .unwrap();

        let all = store
            .list_sessions(&SessionFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 4);

        let by_workflow = store
            .list_sessions(&SessionFilter {
                workflow_id: Some("wf-a".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_workflow.total, 3);

        let by_status = store
            .list_sessions(&SessionFilter {
                status: Some(SessionStatus::Failed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_status.total, 1);
        assert_eq!(by_status.sessions[0].id, failed_id);

        let page = store
            .list_sessions(&SessionFilter {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.sessions.len(), 2);
        assert_eq!(page.total, 4);
    }

    #[tokio::test]
    async fn test_list_sessions_newest_first() {
        let store = InMemorySessionStore::new();
        let first = store.create_session("wf-a", &json!(null)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create_session("wf-a", &json!(null)).await.unwrap();

        let page = store
            .list_sessions(&SessionFilter::default())
            .await
            .unwrap();
        assert_eq!(page.sessions[0].id, second);
        assert_eq!(page.sessions[1].id, first);
    }
}
