//! Lease store error types.

use thiserror::Error;
use time::Duration;

/// Lease store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid lease token")]
    InvalidToken,

    #[error("invalid lease state: {0}")]
    InvalidState(sluice_core::LeaseState),

    #[error("lease expired")]
    ExpiredLease,

    #[error("path busy for another {}s", .remaining.whole_seconds().max(0))]
    PathBusy {
        /// Time until the conflicting lease expires.
        remaining: Duration,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt lease record: {0}")]
    Corrupt(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for lease store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
