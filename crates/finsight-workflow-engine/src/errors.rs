//! Error types for the engine's collaborator trait operations.

use thiserror::Error;

/// Errors from [`QueryBackend`](super::traits::QueryBackend).
#[derive(Debug, Error)]
pub enum QueryBackendError {
    #[error("unknown connection: {connection}")]
    UnknownConnection { connection: String },
    #[error("query backend error: {message}")]
    Backend { message: String },
}

/// Errors from [`GenerationBackend`](super::traits::GenerationBackend).
#[derive(Debug, Error)]
pub enum GenerationBackendError {
    #[error("generation backend error: {message}")]
    Provider { message: String },
}

/// Errors from [`SessionStore`](super::traits::SessionStore).
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found: {id}")]
    NotFound { id: String },
    #[error("session store error: {message}")]
    Store { message: String },
}

/// Errors from [`ProgressSink`](super::traits::ProgressSink).
/// The coordinator logs these and carries on; delivery is at-most-once.
#[derive(Debug, Error)]
pub enum ProgressSinkError {
    #[error("progress publish error: {message}")]
    Publish { message: String },
}

/// Errors from [`DefinitionSource`](super::traits::DefinitionSource).
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("workflow not found: {workflow_id}")]
    NotFound { workflow_id: String },
    #[error("definition source error: {message}")]
    Source { message: String },
}
