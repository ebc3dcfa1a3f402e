//! Single-node execution with retry, timeout and cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::ContextStore;
use crate::node_ctx::NodeCtx;
use crate::nodes::run_node;
use crate::traits::{GenerationBackend, QueryBackend};
use crate::types::{ExecutionHints, Node, NodeError, NodeResult, NodeStatus};

use super::ExecutorConfig;

/// Everything one node task needs, cloned out of the run loop.
pub(super) struct NodeTaskArgs {
    pub session_id: String,
    pub node: Node,
    pub input: Value,
    pub context: Arc<ContextStore>,
    pub query: Arc<dyn QueryBackend>,
    pub generation: Arc<dyn GenerationBackend>,
    pub cancel: CancellationToken,
    pub config: Arc<ExecutorConfig>,
}

pub(super) fn spawn_node(args: NodeTaskArgs) -> JoinHandle<NodeResult> {
    tokio::spawn(execute_node(args))
}

/// Execute one node to a terminal [`NodeResult`].
///
/// Errors are encoded in the result, never propagated; the run loop owns
/// persistence and context writes. The timeout covers each attempt
/// separately, and cancellation wins over everything including backoff.
async fn execute_node(args: NodeTaskArgs) -> NodeResult {
    let clock = std::time::Instant::now();
    let result = NodeResult::running(&args.node.id, args.input.clone());

    let hints = match ExecutionHints::from_config(&args.node.config) {
        Ok(hints) => hints,
        Err(err) => {
            // Bad reserved config fields fail the node before any attempt.
            return finalize(result, Err(err), 1, Vec::new(), clock);
        }
    };

    let timeout_ms = hints
        .timeout_ms
        .unwrap_or_else(|| args.config.timeout_for(args.node.kind));
    let max_attempts = hints.retry.max_attempts.max(1);

    let ctx = NodeCtx::new(
        args.session_id.clone(),
        args.node.id.clone(),
        Arc::clone(&args.context),
        Arc::clone(&args.query),
        Arc::clone(&args.generation),
        args.cancel.clone(),
    );

    let mut attempt = 0;
    let outcome = loop {
        attempt += 1;

        let invocation = run_node(args.node.kind, args.input.clone(), &args.node.config, &ctx);
        let outcome = tokio::select! {
            biased;
            _ = args.cancel.cancelled() => Err(NodeError::Cancelled),
            timed = tokio::time::timeout(Duration::from_millis(timeout_ms), invocation) => {
                match timed {
                    Ok(inner) => inner,
                    Err(_) => Err(NodeError::Timeout { elapsed_ms: timeout_ms }),
                }
            }
        };

        match outcome {
            Ok(output) => break Ok(output),
            Err(err) => {
                if err.is_retryable() && attempt < max_attempts {
                    tracing::debug!(
                        session_id = args.session_id.as_str(),
                        node_id = args.node.id.as_str(),
                        attempt,
                        error = %err,
                        "node attempt failed, retrying"
                    );
                    let backoff = hints.retry.backoff_ms as f64
                        * hints.retry.backoff_multiplier.powi((attempt - 1) as i32);
                    tokio::select! {
                        biased;
                        _ = args.cancel.cancelled() => break Err(NodeError::Cancelled),
                        _ = tokio::time::sleep(Duration::from_millis(backoff as u64)) => {}
                    }
                    continue;
                }
                break Err(err);
            }
        }
    };

    finalize(result, outcome, attempt, ctx.take_warnings(), clock)
}

fn finalize(
    mut result: NodeResult,
    outcome: Result<Value, NodeError>,
    attempts: u32,
    warnings: Vec<String>,
    clock: std::time::Instant,
) -> NodeResult {
    result.attempts = attempts;
    result.warnings = warnings;
    result.completed_at = Some(Utc::now());
    result.execution_time_ms = Some(clock.elapsed().as_millis() as u64);
    match outcome {
        Ok(output) => {
            result.status = NodeStatus::Succeeded;
            result.output = Some(output);
        }
        Err(err) => {
            result.status = NodeStatus::Failed;
            result.error = Some(err);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{GenerationBackendError, QueryBackendError};
    use crate::traits::GenerationParams;
    use crate::types::NodeKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Query backend with a scriptable delay and failure budget.
    struct ScriptedQuery {
        rows: Vec<Value>,
        delay: Duration,
        fail_first: u32,
        calls: AtomicU32,
    }

    impl ScriptedQuery {
        fn rows(rows: Vec<Value>) -> Self {
            Self {
                rows,
                delay: Duration::ZERO,
                fail_first: 0,
                calls: AtomicU32::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            let mut backend = Self::rows(vec![json!({"px": 1})]);
            backend.delay = delay;
            backend
        }

        fn failing_first(fail_first: u32) -> Self {
            let mut backend = Self::rows(vec![json!({"px": 1})]);
            backend.fail_first = fail_first;
            backend
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryBackend for ScriptedQuery {
        async fn run_query(
            &self,
            _connection_ref: &str,
            _query_text: &str,
            _params: &[Value],
        ) -> Result<Vec<Value>, QueryBackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call <= self.fail_first {
                return Err(QueryBackendError::Backend {
                    message: format!("transient failure #{call}"),
                });
            }
            Ok(self.rows.clone())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct NoGeneration;

    #[async_trait]
    impl GenerationBackend for NoGeneration {
        async fn generate(
            &self,
            _prompt_text: &str,
            _params: &GenerationParams,
        ) -> Result<String, GenerationBackendError> {
            Err(GenerationBackendError::Provider {
                message: "not expected in this test".into(),
            })
        }

        fn name(&self) -> &str {
            "none"
        }
    }

    fn task_args(node: Node, input: Value, query: Arc<ScriptedQuery>) -> NodeTaskArgs {
        NodeTaskArgs {
            session_id: "sess-1".into(),
            node,
            input,
            context: Arc::new(ContextStore::new()),
            query,
            generation: Arc::new(NoGeneration),
            cancel: CancellationToken::new(),
            config: Arc::new(ExecutorConfig::default()),
        }
    }

    fn node(id: &str, kind: NodeKind, config: Value) -> Node {
        Node {
            id: id.to_string(),
            kind,
            config,
            position: None,
        }
    }

    #[tokio::test]
    async fn test_success_result_fully_populated() {
        let args = task_args(
            node("shape", NodeKind::Transform, json!({"op": "pick", "path": ""})),
            json!({"px": 42}),
            Arc::new(ScriptedQuery::rows(vec![])),
        );
        let result = execute_node(args).await;

        assert_eq!(result.status, NodeStatus::Succeeded);
        assert_eq!(result.node_id, "shape");
        assert_eq!(result.input, Some(json!({"px": 42})));
        assert_eq!(result.output, Some(json!({"px": 42})));
        assert_eq!(result.attempts, 1);
        assert!(result.error.is_none());
        assert!(result.started_at.is_some());
        assert!(result.completed_at.is_some());
        assert!(result.execution_time_ms.is_some());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_config_timeout_overrides_kind_default() {
        let query = Arc::new(ScriptedQuery::slow(Duration::from_millis(500)));
        let args = task_args(
            node(
                "fetch",
                NodeKind::DataSource,
                json!({"connection": "warehouse", "query": "select 1", "timeout_ms": 20}),
            ),
            json!(null),
            query,
        );

        let start = std::time::Instant::now();
        let result = execute_node(args).await;

        assert!(start.elapsed() < Duration::from_millis(400), "timeout did not cut the attempt short");
        assert_eq!(result.status, NodeStatus::Failed);
        assert_eq!(result.error, Some(NodeError::Timeout { elapsed_ms: 20 }));
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let query = Arc::new(ScriptedQuery::failing_first(1));
        let args = task_args(
            node(
                "fetch",
                NodeKind::DataSource,
                json!({
                    "connection": "warehouse",
                    "query": "select 1",
                    "retry": { "max_attempts": 3, "backoff_ms": 1, "backoff_multiplier": 1.0 }
                }),
            ),
            json!(null),
            Arc::clone(&query),
        );

        let result = execute_node(args).await;

        assert_eq!(result.status, NodeStatus::Succeeded);
        assert_eq!(result.attempts, 2);
        assert_eq!(query.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_keeps_last_error() {
        let query = Arc::new(ScriptedQuery::failing_first(5));
        let args = task_args(
            node(
                "fetch",
                NodeKind::DataSource,
                json!({
                    "connection": "warehouse",
                    "query": "select 1",
                    "retry": { "max_attempts": 2, "backoff_ms": 1, "backoff_multiplier": 1.0 }
                }),
            ),
            json!(null),
            Arc::clone(&query),
        );

        let result = execute_node(args).await;

        assert_eq!(result.status, NodeStatus::Failed);
        assert_eq!(result.attempts, 2);
        assert_eq!(query.call_count(), 2);
        match result.error {
            Some(NodeError::DataSource { ref message }) => {
                assert!(message.contains("transient failure #2"), "got: {message}");
            }
            other => panic!("expected DataSource, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried() {
        // No `connection` in config: deterministic validation failure.
        let query = Arc::new(ScriptedQuery::rows(vec![]));
        let args = task_args(
            node(
                "fetch",
                NodeKind::DataSource,
                json!({"query": "select 1", "retry": { "max_attempts": 3 }}),
            ),
            json!(null),
            Arc::clone(&query),
        );

        let result = execute_node(args).await;

        assert_eq!(result.status, NodeStatus::Failed);
        assert_eq!(result.attempts, 1);
        assert_eq!(query.call_count(), 0);
        assert!(matches!(result.error, Some(NodeError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_cancel_mid_flight() {
        let query = Arc::new(ScriptedQuery::slow(Duration::from_secs(30)));
        let mut args = task_args(
            node(
                "fetch",
                NodeKind::DataSource,
                json!({"connection": "warehouse", "query": "select 1"}),
            ),
            json!(null),
            query,
        );
        let cancel = CancellationToken::new();
        args.cancel = cancel.clone();

        let handle = spawn_node(args);
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        let start = std::time::Instant::now();
        let result = handle.await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1), "cancel should stop the attempt promptly");
        assert_eq!(result.status, NodeStatus::Failed);
        assert_eq!(result.error, Some(NodeError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let query = Arc::new(ScriptedQuery::failing_first(5));
        let mut args = task_args(
            node(
                "fetch",
                NodeKind::DataSource,
                json!({
                    "connection": "warehouse",
                    "query": "select 1",
                    "retry": { "max_attempts": 3, "backoff_ms": 30_000, "backoff_multiplier": 1.0 }
                }),
            ),
            json!(null),
            Arc::clone(&query),
        );
        let cancel = CancellationToken::new();
        args.cancel = cancel.clone();

        let handle = spawn_node(args);
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert_eq!(result.error, Some(NodeError::Cancelled));
        // The first attempt ran, the backoff was interrupted.
        assert_eq!(query.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_hints_fail_before_any_attempt() {
        let query = Arc::new(ScriptedQuery::rows(vec![]));
        let args = task_args(
            node(
                "fetch",
                NodeKind::DataSource,
                json!({"connection": "w", "query": "q", "retry": { "max_attempts": "three" }}),
            ),
            json!(null),
            Arc::clone(&query),
        );

        let result = execute_node(args).await;

        assert_eq!(result.status, NodeStatus::Failed);
        assert!(matches!(result.error, Some(NodeError::Validation { .. })));
        assert_eq!(query.call_count(), 0);
    }

    #[tokio::test]
    async fn test_warnings_surface_on_the_result() {
        let args = task_args(
            node(
                "greet",
                NodeKind::Template,
                json!({"template": "Hello {{who}}"}),
            ),
            json!(null),
            Arc::new(ScriptedQuery::rows(vec![])),
        );

        let result = execute_node(args).await;

        assert_eq!(result.status, NodeStatus::Succeeded);
        assert_eq!(result.output, Some(json!("Hello ")));
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("who"), "got: {:?}", result.warnings);
    }
}
