//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

use crate::types::ExecutionStatus;

/// Errors from [`ChainEngine`](super::ChainEngine) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChainError {
    /// The requested chain was not found.
    #[error("chain not found: {0}")]
    ChainNotFound(Uuid),
    /// The requested execution was not found.
    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),
    /// The chain failed structural validation; every problem found is
    /// listed.
    #[error("chain validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },
    /// The operation requires a RUNNING execution.
    #[error("execution {id} is not running (status: {status})")]
    NotRunning { id: Uuid, status: ExecutionStatus },
    /// A scheduler loop is already driving this execution.
    #[error("execution {0} is already being run")]
    AlreadyRunning(Uuid),
    /// A store error occurred.
    #[error("store error: {0}")]
    Store(#[from] crate::errors::StoreError),
    /// An agent directory error occurred.
    #[error("agent directory error: {0}")]
    Directory(#[from] crate::errors::DirectoryError),
    /// A log sink error occurred.
    #[error("log sink error: {0}")]
    LogSink(#[from] crate::errors::LogSinkError),
}
