//! Lease store abstraction and backends for the sluice write gateway.
//!
//! The store owns lease records exclusively:
//! - Token-indexed lookup and lifecycle transitions
//! - Path-overlap exclusion at lease creation
//! - Atomic commit begin/finish
//! - Bulk cancellation and expiry reaping

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryLeaseStore;
pub use sqlite::SqliteLeaseStore;
pub use store::{CommitOutcome, LeaseStore};

use sluice_core::config::LeaseDbConfig;
use std::sync::Arc;

/// Create a lease store from configuration.
pub async fn from_config(config: &LeaseDbConfig) -> StoreResult<Arc<dyn LeaseStore>> {
    match config {
        LeaseDbConfig::Memory => Ok(Arc::new(MemoryLeaseStore::new()) as Arc<dyn LeaseStore>),
        LeaseDbConfig::Sqlite { path } => {
            let store = SqliteLeaseStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn LeaseStore>)
        }
    }
}
