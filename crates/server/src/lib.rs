//! HTTP API server for the sluice write gateway.
//!
//! This crate provides the write protocol's HTTP surface:
//! - Lease acquisition, inspection, commit, and cancellation
//! - Payload submission
//! - Repository enable/disable administration

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{KeyId, RequestId};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
