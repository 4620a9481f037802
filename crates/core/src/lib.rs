//! Core domain types and shared logic for the sluice write gateway.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Lease paths and the overlap relation
//! - Lease tokens, states, and lifecycle
//! - Repository tags attached at commit
//! - API protocol version negotiation
//! - Gateway configuration

pub mod config;
pub mod error;
pub mod lease;
pub mod path;
pub mod version;

pub use config::{GatewayConfig, LeaseDbConfig, ServerConfig};
pub use error::{Error, Result};
pub use lease::{Lease, LeaseState, LeaseToken, RepositoryTag};
pub use path::LeasePath;
pub use version::{negotiate, MAX_API_PROTOCOL_VERSION, MIN_API_PROTOCOL_VERSION};
