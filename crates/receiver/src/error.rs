//! Receiver and worker pool error types.

use thiserror::Error;

/// Errors from receiver processes and the worker pool.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("failed to spawn receiver: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("receiver i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("receiver protocol error: {0}")]
    Protocol(String),

    #[error("receiver rejected request: {0}")]
    Rejected(String),

    #[error("receiver exited with {0}")]
    Exit(std::process::ExitStatus),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("task aborted before completion")]
    TaskAborted,
}

impl From<serde_json::Error> for ReceiverError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Result type for receiver operations.
pub type ReceiverResult<T> = std::result::Result<T, ReceiverError>;
