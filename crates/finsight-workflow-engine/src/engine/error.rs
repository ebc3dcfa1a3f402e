//! Engine error types.

use thiserror::Error;

use crate::errors::{DefinitionError, SessionStoreError};
use crate::validate::ValidationError;

/// Errors from [`Engine`](super::Engine) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The definition failed structural validation; the run never started.
    #[error("invalid definition `{workflow_id}`: {}", .errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    InvalidDefinition {
        workflow_id: String,
        /// Every fatal finding, in definition order.
        errors: Vec<ValidationError>,
    },
    /// The definition source failed or knows no such workflow.
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),
    /// Creating the session failed; nothing was dispatched.
    #[error("session store error: {0}")]
    SessionStore(#[from] SessionStoreError),
}
