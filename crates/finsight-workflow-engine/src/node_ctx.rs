//! Runtime context given to every node invocation.
//!
//! Node executors interact with the engine exclusively through [`NodeCtx`].
//! The run loop constructs a fresh `NodeCtx` per invocation. Context reads
//! go through it; context writes do not. Only the run loop writes a node's
//! output back to the store, which keeps the write-once discipline in one
//! place.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::ContextStore;
use crate::traits::{GenerationBackend, GenerationParams, QueryBackend};
use crate::types::NodeError;

/// The runtime context given to every node invocation.
pub struct NodeCtx {
    session_id: String,
    node_id: String,
    context: Arc<ContextStore>,
    query: Arc<dyn QueryBackend>,
    generation: Arc<dyn GenerationBackend>,
    cancel: CancellationToken,
    warnings: parking_lot::Mutex<Vec<String>>,
}

impl NodeCtx {
    /// Construct a `NodeCtx` for a node execution.
    ///
    /// Typically only called by the run loop. Executor code receives
    /// `&NodeCtx` and never constructs one directly.
    pub fn new(
        session_id: String,
        node_id: String,
        context: Arc<ContextStore>,
        query: Arc<dyn QueryBackend>,
        generation: Arc<dyn GenerationBackend>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            node_id,
            context,
            query,
            generation,
            cancel,
            warnings: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// The session this node execution belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The node being executed.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Read a single value from the session context.
    pub fn context_get(&self, key: &str) -> Option<Value> {
        self.context.get(key)
    }

    /// Snapshot the entire session context, sorted by key.
    pub fn context_snapshot(&self) -> std::collections::BTreeMap<String, Value> {
        self.context.snapshot()
    }

    /// Run a query through the configured [`QueryBackend`].
    pub async fn run_query(
        &self,
        connection_ref: &str,
        query_text: &str,
        params: &[Value],
    ) -> Result<Vec<Value>, NodeError> {
        self.query
            .run_query(connection_ref, query_text, params)
            .await
            .map_err(|e| NodeError::DataSource {
                message: e.to_string(),
            })
    }

    /// Generate text through the configured [`GenerationBackend`].
    pub async fn generate(
        &self,
        prompt_text: &str,
        params: &GenerationParams,
    ) -> Result<String, NodeError> {
        self.generation
            .generate(prompt_text, params)
            .await
            .map_err(|e| NodeError::Generation {
                message: e.to_string(),
            })
    }

    /// Cancellation token for this run. Long-running executors should check
    /// it at natural yield points; the run loop also enforces it externally.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Record a non-fatal problem with this invocation. Warnings end up on
    /// the node's persisted result.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(
            session_id = self.session_id.as_str(),
            node_id = self.node_id.as_str(),
            "{message}"
        );
        self.warnings.lock().push(message);
    }

    /// Drain collected warnings. Called once by the run loop after the
    /// executor returns.
    pub(crate) fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut self.warnings.lock())
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_support {
    //! Builder for [`NodeCtx`] instances in executor tests.

    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    use crate::context::ContextStore;
    use crate::errors::{GenerationBackendError, QueryBackendError};
    use crate::traits::{GenerationBackend, GenerationParams, QueryBackend};

    use super::NodeCtx;

    struct StaticQuery {
        result: Result<Vec<Value>, String>,
    }

    #[async_trait]
    impl QueryBackend for StaticQuery {
        async fn run_query(
            &self,
            _connection_ref: &str,
            _query_text: &str,
            _params: &[Value],
        ) -> Result<Vec<Value>, QueryBackendError> {
            self.result
                .clone()
                .map_err(|message| QueryBackendError::Backend { message })
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct StaticGeneration {
        result: Result<String, String>,
    }

    #[async_trait]
    impl GenerationBackend for StaticGeneration {
        async fn generate(
            &self,
            _prompt_text: &str,
            _params: &GenerationParams,
        ) -> Result<String, GenerationBackendError> {
            self.result
                .clone()
                .map_err(|message| GenerationBackendError::Provider { message })
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// Builder for a test `NodeCtx` with canned backends.
    pub(crate) struct TestCtx {
        node_id: String,
        context: Arc<ContextStore>,
        query_result: Result<Vec<Value>, String>,
        generation_result: Result<String, String>,
    }

    impl TestCtx {
        pub(crate) fn builder() -> Self {
            Self {
                node_id: "test-node".into(),
                context: Arc::new(ContextStore::new()),
                query_result: Ok(Vec::new()),
                generation_result: Ok(String::new()),
            }
        }

        pub(crate) fn node_id(mut self, node_id: &str) -> Self {
            self.node_id = node_id.to_string();
            self
        }

        pub(crate) fn context_entry(self, key: &str, value: Value) -> Self {
            self.context.set(key, value);
            self
        }

        pub(crate) fn query_rows(mut self, rows: Vec<Value>) -> Self {
            self.query_result = Ok(rows);
            self
        }

        pub(crate) fn failing_query(mut self, message: &str) -> Self {
            self.query_result = Err(message.to_string());
            self
        }

        pub(crate) fn generation_reply(mut self, reply: &str) -> Self {
            self.generation_result = Ok(reply.to_string());
            self
        }

        pub(crate) fn failing_generation(mut self, message: &str) -> Self {
            self.generation_result = Err(message.to_string());
            self
        }

        pub(crate) fn build(self) -> NodeCtx {
            NodeCtx::new(
                "test-session".into(),
                self.node_id,
                self.context,
                Arc::new(StaticQuery {
                    result: self.query_result,
                }),
                Arc::new(StaticGeneration {
                    result: self.generation_result,
                }),
                CancellationToken::new(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestCtx;
    use crate::traits::GenerationParams;
    use crate::types::NodeError;
    use serde_json::json;

    #[tokio::test]
    async fn query_errors_map_to_data_source() {
        let ctx = TestCtx::builder().failing_query("connection refused").build();
        let err = ctx.run_query("warehouse", "select 1", &[]).await.unwrap_err();
        match err {
            NodeError::DataSource { message } => {
                assert!(message.contains("connection refused"), "got: {message}");
            }
            other => panic!("expected DataSource, got: {other}"),
        }
    }

    #[tokio::test]
    async fn generation_errors_map_to_generation() {
        let ctx = TestCtx::builder().failing_generation("rate limited").build();
        let err = ctx
            .generate("hello", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Generation { .. }));
    }

    #[tokio::test]
    async fn context_reads_through_ctx() {
        let ctx = TestCtx::builder()
            .context_entry("ticker", json!("ACME"))
            .build();
        assert_eq!(ctx.context_get("ticker"), Some(json!("ACME")));
        assert!(ctx.context_get("missing").is_none());
        assert_eq!(ctx.context_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn warnings_are_collected_once() {
        let ctx = TestCtx::builder().build();
        ctx.warn("placeholder `foo` not found");
        ctx.warn("placeholder `bar` not found");

        let warnings = ctx.take_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(ctx.take_warnings().is_empty());
    }
}
