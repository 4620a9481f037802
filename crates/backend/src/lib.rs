//! Backend services for the sluice write gateway.
//!
//! This crate ties the lease store and the receiver pool together
//! behind the policy layer the write protocol exposes:
//! - Key and repository access policy (the access oracle)
//! - Lease granting, inspection, cancellation, payload submission,
//!   and commit orchestration
//! - The background expiry reaper

pub mod access;
pub mod error;
pub mod gateway;
pub mod services;

pub use access::{AccessConfig, KeyConfig, KeyPermission, RepositoryConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::NewLeaseGrant;
pub use services::{spawn_reaper, Services, REAP_INTERVAL};
