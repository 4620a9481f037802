//! In-memory lease store.

use crate::error::{StoreError, StoreResult};
use crate::store::{CommitOutcome, LeaseStore};
use async_trait::async_trait;
use sluice_core::{Lease, LeasePath, LeaseState, LeaseToken};
use std::collections::HashMap;
use std::sync::Mutex;
use time::{Duration, OffsetDateTime};

/// Lease store backed by a process-local map.
///
/// Used for tests and single-process deployments where leases need not
/// survive a restart. The overlap check and insert run under one lock,
/// which gives the same linearizability as the SQLite transaction.
#[derive(Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryLeaseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn new_lease(
        &self,
        key_id: &str,
        lease_path: &LeasePath,
        protocol_version: u32,
        ttl: Duration,
    ) -> StoreResult<LeaseToken> {
        let now = OffsetDateTime::now_utc();
        let mut leases = self.leases.lock().expect("lease map poisoned");

        if let Some(conflict) = leases
            .values()
            .find(|l| !l.state.is_terminal() && l.lease_path.overlaps(lease_path))
        {
            return Err(StoreError::PathBusy {
                remaining: conflict.remaining(now),
            });
        }

        let mut lease = Lease::new(key_id, lease_path.clone(), protocol_version, ttl, now);
        // Minting collisions are not reachable in practice; re-mint
        // rather than clobber an existing record.
        while leases.contains_key(lease.token.as_str()) {
            lease.token = LeaseToken::mint();
        }
        let token = lease.token.clone();
        leases.insert(token.as_str().to_string(), lease);
        Ok(token)
    }

    async fn get_lease(&self, token: &LeaseToken) -> StoreResult<Lease> {
        let leases = self.leases.lock().expect("lease map poisoned");
        leases
            .get(token.as_str())
            .cloned()
            .ok_or(StoreError::InvalidToken)
    }

    async fn get_leases(&self) -> StoreResult<HashMap<String, Lease>> {
        let leases = self.leases.lock().expect("lease map poisoned");
        Ok(leases
            .values()
            .filter(|l| !l.state.is_terminal())
            .map(|l| (l.lease_path.as_str().to_string(), l.clone()))
            .collect())
    }

    async fn cancel_lease(&self, token: &LeaseToken) -> StoreResult<()> {
        let mut leases = self.leases.lock().expect("lease map poisoned");
        let lease = leases
            .get_mut(token.as_str())
            .ok_or(StoreError::InvalidToken)?;
        if lease.state != LeaseState::Active {
            return Err(StoreError::InvalidState(lease.state));
        }
        lease.state = LeaseState::Cancelled;
        Ok(())
    }

    async fn cancel_leases_under(&self, repo_path: &str) -> StoreResult<u64> {
        let mut leases = self.leases.lock().expect("lease map poisoned");
        let mut cancelled = 0;
        for lease in leases.values_mut() {
            if lease.state == LeaseState::Active && lease.lease_path.is_under(repo_path) {
                lease.state = LeaseState::Cancelled;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn begin_commit(&self, token: &LeaseToken) -> StoreResult<Lease> {
        let now = OffsetDateTime::now_utc();
        let mut leases = self.leases.lock().expect("lease map poisoned");
        let lease = leases
            .get_mut(token.as_str())
            .ok_or(StoreError::InvalidToken)?;
        if lease.state != LeaseState::Active {
            return Err(StoreError::InvalidState(lease.state));
        }
        if lease.is_expired(now) {
            return Err(StoreError::ExpiredLease);
        }
        lease.state = LeaseState::Committing;
        Ok(lease.clone())
    }

    async fn finish_commit(&self, token: &LeaseToken, outcome: CommitOutcome) -> StoreResult<()> {
        let mut leases = self.leases.lock().expect("lease map poisoned");
        let lease = leases
            .get_mut(token.as_str())
            .ok_or(StoreError::InvalidToken)?;
        if lease.state != LeaseState::Committing {
            return Err(StoreError::InvalidState(lease.state));
        }
        lease.state = match outcome {
            CommitOutcome::Success => LeaseState::Committed,
            CommitOutcome::Failure => LeaseState::Cancelled,
        };
        Ok(())
    }

    async fn reap_expired(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let mut leases = self.leases.lock().expect("lease map poisoned");
        let mut reaped = 0;
        for lease in leases.values_mut() {
            if !lease.state.is_terminal() && lease.is_expired(now) {
                lease.state = LeaseState::Expired;
                reaped += 1;
            }
        }
        Ok(reaped)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
