//! Lease manager: the policy layer the write protocol exposes.

use crate::error::{GatewayError, GatewayResult};
use crate::services::Services;
use bytes::Bytes;
use sluice_core::{version, Lease, LeasePath, LeaseToken, RepositoryTag};
use sluice_leasedb::{CommitOutcome, LeaseStore};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

/// A granted lease: the token plus the protocol version the reply
/// advertises back to the client.
#[derive(Debug)]
pub struct NewLeaseGrant {
    pub token: LeaseToken,
    pub api_version: u32,
}

// Releases a committing lease as cancelled if the commit operation is
// dropped mid-flight (caller cancellation, protocol-level panic).
// Defused on both regular exits of `commit_lease`.
struct FinishCommitGuard {
    leases: Option<Arc<dyn LeaseStore>>,
    token: LeaseToken,
}

impl FinishCommitGuard {
    fn new(leases: Arc<dyn LeaseStore>, token: LeaseToken) -> Self {
        Self {
            leases: Some(leases),
            token,
        }
    }

    fn defuse(mut self) {
        self.leases = None;
    }
}

impl Drop for FinishCommitGuard {
    fn drop(&mut self) {
        if let Some(leases) = self.leases.take() {
            let token = self.token.clone();
            tracing::warn!(token = %token, "commit abandoned mid-flight, releasing lease");
            tokio::spawn(async move {
                if let Err(e) = leases.finish_commit(&token, CommitOutcome::Failure).await {
                    tracing::error!(token = %token, error = %e, "failed to release abandoned commit");
                }
            });
        }
    }
}

impl Services {
    /// Grant a new lease over `path` to `key_id`.
    pub async fn new_lease(
        &self,
        key_id: &str,
        path: &str,
        client_version: u32,
    ) -> GatewayResult<NewLeaseGrant> {
        let lease_path = LeasePath::parse(path)?;

        let repository = lease_path.repository();
        match self.access.repo_config(repository) {
            None => return Err(GatewayError::UnknownRepository(repository.to_string())),
            Some(repo) if !repo.enabled => {
                return Err(GatewayError::RepositoryDisabled(repository.to_string()));
            }
            Some(_) => {}
        }

        // Unknown keys fall out of key_may_lease as plain denials.
        if !self.access.key_may_lease(key_id, &lease_path) {
            return Err(GatewayError::PermissionDenied {
                key_id: key_id.to_string(),
                path: lease_path.as_str().to_string(),
            });
        }

        let api_version =
            version::negotiate(client_version).ok_or(GatewayError::IncompatibleVersion {
                client: client_version,
                min: version::MIN_API_PROTOCOL_VERSION,
            })?;

        let token = self
            .leases
            .new_lease(key_id, &lease_path, api_version, self.config.max_lease_time())
            .await?;

        tracing::info!(
            key_id,
            lease_path = %lease_path,
            api_version,
            "lease granted"
        );

        Ok(NewLeaseGrant { token, api_version })
    }

    /// Look up one lease by token.
    pub async fn get_lease(&self, token: &str) -> GatewayResult<Lease> {
        let token = LeaseToken::parse(token)?;
        Ok(self.leases.get_lease(&token).await?)
    }

    /// Snapshot of active and committing leases, keyed by path.
    pub async fn get_leases(&self) -> GatewayResult<HashMap<String, Lease>> {
        Ok(self.leases.get_leases().await?)
    }

    /// Cancel an active lease.
    pub async fn cancel_lease(&self, token: &str) -> GatewayResult<()> {
        let token = LeaseToken::parse(token)?;
        self.leases.cancel_lease(&token).await?;
        tracing::info!(token = %token, "lease cancelled");
        Ok(())
    }

    /// Cancel every active lease at or under `repo_path`.
    pub async fn cancel_leases_under(&self, repo_path: &str) -> GatewayResult<u64> {
        let cancelled = self.leases.cancel_leases_under(repo_path).await?;
        tracing::info!(repo_path, cancelled, "leases bulk-cancelled");
        Ok(cancelled)
    }

    /// Submit one payload against an active lease.
    ///
    /// The payload is buffered; callers size payloads to fit memory.
    pub async fn submit_payload(
        &self,
        token: &str,
        payload: Bytes,
        digest: &str,
        header_size: u32,
    ) -> GatewayResult<()> {
        let token = LeaseToken::parse(token)?;
        let lease = self.leases.get_lease(&token).await?;

        if !lease.state.accepts_payloads() {
            return Err(GatewayError::InvalidLease(lease.state));
        }
        if lease.is_expired(OffsetDateTime::now_utc()) {
            return Err(GatewayError::ExpiredLease);
        }

        self.pool
            .submit_payload(&lease.lease_path, payload, digest, header_size)
            .await?;

        tracing::debug!(
            token = %token,
            lease_path = %lease.lease_path,
            digest,
            "payload submitted"
        );
        Ok(())
    }

    /// Commit a lease: advance the repository root hash and consume
    /// the lease.
    ///
    /// The lease leaves `committing` on every path out of this
    /// function, including cancellation of the in-flight await.
    pub async fn commit_lease(
        &self,
        token: &str,
        old_root_hash: &str,
        new_root_hash: &str,
        tag: RepositoryTag,
    ) -> GatewayResult<()> {
        let token = LeaseToken::parse(token)?;

        // Hold the repository's commit lock across the whole
        // begin-commit .. finish-commit window, not just the receiver
        // call: a second lease of the same repository must not enter
        // `committing` while this one is there.
        let repo_lock = {
            let lease = self.leases.get_lease(&token).await?;
            self.repo_commit_lock(lease.lease_path.repository())
        };
        let _commit_permit = repo_lock.lock().await;

        let lease = self.leases.begin_commit(&token).await.map_err(|e| match e {
            sluice_leasedb::StoreError::ExpiredLease => GatewayError::ExpiredLease,
            other => other.into(),
        })?;
        let guard = FinishCommitGuard::new(self.leases.clone(), token.clone());

        let result = self
            .pool
            .commit(&lease.lease_path, old_root_hash, new_root_hash, tag)
            .await;

        let outcome = match &result {
            Ok(()) => CommitOutcome::Success,
            Err(_) => CommitOutcome::Failure,
        };
        let finished = self.leases.finish_commit(&token, outcome).await;
        guard.defuse();
        finished?;

        match result {
            Ok(()) => {
                tracing::info!(
                    token = %token,
                    lease_path = %lease.lease_path,
                    new_root_hash,
                    "lease committed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    token = %token,
                    lease_path = %lease.lease_path,
                    error = %e,
                    "commit failed, lease released"
                );
                Err(e.into())
            }
        }
    }
}
