//! Lease store trait.

use crate::error::StoreResult;
use async_trait::async_trait;
use sluice_core::{Lease, LeasePath, LeaseToken};
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};

/// Terminal outcome of a commit attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The receiver advanced the root hash.
    Success,
    /// The receiver failed; the lease is released as cancelled.
    Failure,
}

/// Durable backing for leases.
///
/// Implementations own the lease records exclusively; every state
/// transition is atomic under the store's discipline. The path-overlap
/// query in [`new_lease`](LeaseStore::new_lease) is consistent with
/// concurrent inserts: overlap is computed and the insert performed in
/// one critical section.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Create an active lease iff no overlapping non-terminal lease
    /// exists. Fails with [`StoreError::PathBusy`](crate::StoreError::PathBusy)
    /// carrying the conflicting lease's time-to-expiry.
    async fn new_lease(
        &self,
        key_id: &str,
        lease_path: &LeasePath,
        protocol_version: u32,
        ttl: Duration,
    ) -> StoreResult<LeaseToken>;

    /// Look up a lease in any state.
    async fn get_lease(&self, token: &LeaseToken) -> StoreResult<Lease>;

    /// Snapshot of active and committing leases, keyed by lease path.
    async fn get_leases(&self) -> StoreResult<HashMap<String, Lease>>;

    /// Atomic `active -> cancelled`.
    async fn cancel_lease(&self, token: &LeaseToken) -> StoreResult<()>;

    /// Bulk-cancel active leases at or under `repo_path`. Returns the
    /// number of leases cancelled.
    async fn cancel_leases_under(&self, repo_path: &str) -> StoreResult<u64>;

    /// Atomic `active -> committing`. Returns the lease snapshot taken
    /// inside the transition.
    async fn begin_commit(&self, token: &LeaseToken) -> StoreResult<Lease>;

    /// Resolve a committing lease: `committing -> committed` on
    /// success, `committing -> cancelled` on failure.
    async fn finish_commit(&self, token: &LeaseToken, outcome: CommitOutcome) -> StoreResult<()>;

    /// Transition every non-terminal lease with `expires <= now` to
    /// expired. Returns the number of leases reaped. The background
    /// reaper is the only caller; this keeps the expiry transition
    /// authoritative.
    async fn reap_expired(&self, now: OffsetDateTime) -> StoreResult<u64>;

    /// Check store connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;

    /// Flush and release the backing resources.
    async fn close(&self) -> StoreResult<()>;
}
