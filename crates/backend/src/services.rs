//! Backend service container and lifecycle.

use crate::access::AccessConfig;
use crate::error::GatewayResult;
use sluice_core::GatewayConfig;
use sluice_leasedb::LeaseStore;
use sluice_receiver::{MockBehavior, Pool, ReceiverSpawner};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How often the reaper enforces lease expiry.
pub const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Container for the backend services behind the HTTP surface.
pub struct Services {
    pub access: AccessConfig,
    pub leases: Arc<dyn LeaseStore>,
    pub pool: Pool,
    pub config: GatewayConfig,
    // Serializes the whole begin-commit .. finish-commit window per
    // repository, so at most one lease per repository is ever in
    // `committing`. Lazily populated, never reclaimed.
    commit_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Services {
    /// Initialize every backend service from configuration.
    pub async fn start(config: GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;

        let access = AccessConfig::load(&config.access_config_file)?;
        let leases = sluice_leasedb::from_config(&config.lease_db).await?;

        let spawner = if config.mock_receiver {
            ReceiverSpawner::Mock(MockBehavior::default())
        } else {
            ReceiverSpawner::Process {
                exec: config.receiver_path.clone(),
            }
        };
        let pool = Pool::start(spawner, config.num_receivers)?;

        Ok(Self::with_parts(access, leases, pool, config))
    }

    /// Assemble services from already-built parts (used by tests).
    pub fn with_parts(
        access: AccessConfig,
        leases: Arc<dyn LeaseStore>,
        pool: Pool,
        config: GatewayConfig,
    ) -> Self {
        Self {
            access,
            leases,
            pool,
            config,
            commit_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub(crate) fn repo_commit_lock(&self, repository: &str) -> Arc<Mutex<()>> {
        let mut locks = self.commit_locks.lock().expect("commit lock map poisoned");
        locks.entry(repository.to_string()).or_default().clone()
    }

    /// Stop the worker pool and close the lease store.
    pub async fn stop(&self) -> GatewayResult<()> {
        self.pool.stop().await;
        self.leases.close().await?;
        Ok(())
    }
}

/// Spawn the background reaper.
///
/// The reaper is the only component performing the expiry transition,
/// which keeps it authoritative: leases left `committing` by a crashed
/// gateway are collected here once their deadline passes.
pub fn spawn_reaper(leases: Arc<dyn LeaseStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match leases.reap_expired(OffsetDateTime::now_utc()).await {
                Ok(0) => {}
                Ok(reaped) => tracing::info!(reaped, "expired leases reaped"),
                Err(e) => tracing::error!(error = %e, "lease reaper failed"),
            }
        }
    })
}
