//! Gateway policy layer error types.

use sluice_core::LeaseState;
use thiserror::Error;

/// Errors surfaced by the gateway's policy operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("repository disabled: {0}")]
    RepositoryDisabled(String),

    #[error("key {key_id} may not lease {path}")]
    PermissionDenied { key_id: String, path: String },

    #[error("incompatible request version: {client}, min version: {min}")]
    IncompatibleVersion { client: u32, min: u32 },

    #[error("invalid lease state: {0}")]
    InvalidLease(LeaseState),

    #[error("lease expired")]
    ExpiredLease,

    #[error("{0}")]
    Malformed(#[from] sluice_core::Error),

    #[error("access configuration error: {0}")]
    AccessConfig(String),

    #[error(transparent)]
    Store(#[from] sluice_leasedb::StoreError),

    #[error(transparent)]
    Receiver(#[from] sluice_receiver::ReceiverError),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
