use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use serde_json::Value;

use finsight_workflow_engine::errors::QueryBackendError;
use finsight_workflow_engine::traits::QueryBackend;

/// MockWarehouse plays back canned row sets without any external service.
///
/// Rows are registered per connection name; the query text and parameters
/// are accepted but ignored, so a workflow under test sees the same rows on
/// every run. Latency and failures are injectable to exercise timeout and
/// retry paths.
pub struct MockWarehouse {
    name: String,
    latency_ms: u64,
    latency_variance_ms: u64,
    tables: RwLock<BTreeMap<String, Vec<Value>>>,
    fail_remaining: AtomicU32,
}

impl MockWarehouse {
    /// Create a new MockWarehouse with configurable latency
    ///
    /// # Arguments
    /// * `latency_ms` - Base simulated latency in milliseconds (0 for instant responses)
    /// * `latency_variance_ms` - Maximum variation from base latency (adds randomness)
    pub fn new(latency_ms: u64, latency_variance_ms: u64) -> Self {
        Self {
            name: "mock-warehouse".to_string(),
            latency_ms,
            latency_variance_ms,
            tables: RwLock::new(BTreeMap::new()),
            fail_remaining: AtomicU32::new(0),
        }
    }

    /// Create a MockWarehouse with instant responses (0ms latency)
    pub fn instant() -> Self {
        Self::new(0, 0)
    }

    /// Create a MockWarehouse with realistic query latency (40ms ± 15ms)
    pub fn realistic() -> Self {
        Self::new(40, 15)
    }

    /// Register rows for a connection, replacing any previous set.
    pub fn with_table(self, connection: impl Into<String>, rows: Vec<Value>) -> Self {
        self.tables.write().insert(connection.into(), rows);
        self
    }

    /// Register rows after construction, e.g. between runs.
    pub fn load_table(&self, connection: impl Into<String>, rows: Vec<Value>) {
        self.tables.write().insert(connection.into(), rows);
    }

    /// Fail the next `n` queries with a backend error, then recover.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Calculate actual latency with variation
    fn simulated_latency(&self) -> u64 {
        if self.latency_variance_ms == 0 {
            return self.latency_ms;
        }
        let mut rng = rand::rng();
        let variance = rng.random_range(0..=self.latency_variance_ms);
        if rng.random_bool(0.5) {
            self.latency_ms.saturating_add(variance)
        } else {
            self.latency_ms
                .saturating_sub(variance.min(self.latency_ms))
        }
    }

    fn take_failure(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QueryBackend for MockWarehouse {
    async fn run_query(
        &self,
        connection_ref: &str,
        _query_text: &str,
        _params: &[Value],
    ) -> Result<Vec<Value>, QueryBackendError> {
        let latency = self.simulated_latency();
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.take_failure() {
            return Err(QueryBackendError::Backend {
                message: "injected warehouse failure".to_string(),
            });
        }

        self.tables
            .read()
            .get(connection_ref)
            .cloned()
            .ok_or_else(|| QueryBackendError::UnknownConnection {
                connection: connection_ref.to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
