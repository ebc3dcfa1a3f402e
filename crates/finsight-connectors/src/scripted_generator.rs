use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

use finsight_workflow_engine::errors::GenerationBackendError;
use finsight_workflow_engine::traits::{GenerationBackend, GenerationParams};

const FALLBACK_REPLY: &str = "Scripted mock completion";

/// ScriptedGenerator returns queued replies without calling any provider.
///
/// Replies are consumed in FIFO order; once the script is exhausted every
/// call returns a fixed fallback line, so a run never blocks on an empty
/// script. `max_tokens` is honored with the usual ~4 chars per token
/// heuristic, which lets tests exercise truncated completions.
pub struct ScriptedGenerator {
    name: String,
    latency_ms: u64,
    latency_variance_ms: u64,
    script: Mutex<VecDeque<String>>,
    fail_remaining: AtomicU32,
}

impl ScriptedGenerator {
    /// Create a new ScriptedGenerator with configurable latency
    ///
    /// # Arguments
    /// * `latency_ms` - Base simulated latency in milliseconds (0 for instant responses)
    /// * `latency_variance_ms` - Maximum variation from base latency (adds randomness)
    pub fn new(latency_ms: u64, latency_variance_ms: u64) -> Self {
        Self {
            name: "scripted".to_string(),
            latency_ms,
            latency_variance_ms,
            script: Mutex::new(VecDeque::new()),
            fail_remaining: AtomicU32::new(0),
        }
    }

    /// Create a ScriptedGenerator with instant responses (0ms latency)
    pub fn instant() -> Self {
        Self::new(0, 0)
    }

    /// Create a ScriptedGenerator with realistic completion latency (750ms ± 250ms)
    pub fn realistic() -> Self {
        Self::new(750, 250)
    }

    /// Queue a reply. Replies are returned in the order queued.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.script.lock().push_back(reply.into());
        self
    }

    /// Queue a reply after construction, e.g. between runs.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script.lock().push_back(reply.into());
    }

    /// Fail the next `n` calls with a provider error, then recover.
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
impl GenerationBackend for ScriptedGenerator {
    async fn generate(
        &self,
        _prompt_text: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationBackendError> {
        let latency = self.simulated_latency();
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.take_failure() {
            return Err(GenerationBackendError::Provider {
                message: "injected generation failure".to_string(),
            });
        }

        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());

        // Honor the token budget: ~4 characters per token.
        if let Some(max) = params.max_tokens {
            let budget = max as usize * 4;
            if reply.chars().count() > budget {
                return Ok(reply.chars().take(budget).collect());
            }
        }
        Ok(reply)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
