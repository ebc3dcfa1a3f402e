//! Placeholder backends used when the builder is given none.
//!
//! Keeping these as real trait implementations lets an engine with only
//! transform/template/output nodes run without any external collaborator.
//! A workflow that does reach a `data_source` or `prompt` node fails that
//! node with a clear message instead of panicking at startup.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{GenerationBackendError, QueryBackendError};
use crate::traits::{GenerationBackend, GenerationParams, QueryBackend};

/// Query backend that rejects every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredQueryBackend;

#[async_trait]
impl QueryBackend for UnconfiguredQueryBackend {
    async fn run_query(
        &self,
        connection_ref: &str,
        _query_text: &str,
        _params: &[Value],
    ) -> Result<Vec<Value>, QueryBackendError> {
        Err(QueryBackendError::UnknownConnection {
            connection: connection_ref.to_string(),
        })
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Generation backend that rejects every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGenerationBackend;

#[async_trait]
impl GenerationBackend for UnconfiguredGenerationBackend {
    async fn generate(
        &self,
        _prompt_text: &str,
        _params: &GenerationParams,
    ) -> Result<String, GenerationBackendError> {
        Err(GenerationBackendError::Provider {
            message: "no generation backend configured".into(),
        })
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}
