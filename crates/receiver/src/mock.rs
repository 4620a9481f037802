//! In-process mock receiver.

use crate::error::ReceiverResult;
use crate::process::Receiver;
use async_trait::async_trait;
use bytes::Bytes;
use sluice_core::RepositoryTag;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters recorded by mock receivers, shared across every receiver
/// spawned from one [`MockBehavior`].
#[derive(Debug, Default)]
pub struct MockMetrics {
    pub payloads: AtomicU64,
    pub commits: AtomicU64,
    pub quits: AtomicU64,
    in_flight_commits: Mutex<HashMap<String, usize>>,
    max_concurrent_commits: Mutex<HashMap<String, usize>>,
}

impl MockMetrics {
    /// Highest number of commits observed in flight at once for a repository.
    pub fn max_concurrent_commits(&self, repository: &str) -> usize {
        self.max_concurrent_commits
            .lock()
            .expect("metrics poisoned")
            .get(repository)
            .copied()
            .unwrap_or(0)
    }

    fn commit_entered(&self, repository: &str) {
        let mut in_flight = self.in_flight_commits.lock().expect("metrics poisoned");
        let count = in_flight.entry(repository.to_string()).or_insert(0);
        *count += 1;
        let mut max = self.max_concurrent_commits.lock().expect("metrics poisoned");
        let peak = max.entry(repository.to_string()).or_insert(0);
        *peak = (*peak).max(*count);
    }

    fn commit_left(&self, repository: &str) {
        let mut in_flight = self.in_flight_commits.lock().expect("metrics poisoned");
        if let Some(count) = in_flight.get_mut(repository) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Scripted behavior for mock receivers.
#[derive(Clone, Debug, Default)]
pub struct MockBehavior {
    /// Fail `submit_payload` with this reason.
    pub payload_error: Option<String>,
    /// Fail `commit` with this reason.
    pub commit_error: Option<String>,
    /// Fail `quit` with this reason.
    pub quit_error: Option<String>,
    /// Hold the commit open for this long, to widen race windows in tests.
    pub commit_delay: Duration,
    /// Shared counters.
    pub metrics: Arc<MockMetrics>,
}

impl MockBehavior {
    fn scripted(error: &Option<String>) -> ReceiverResult<()> {
        match error {
            Some(reason) => Err(crate::error::ReceiverError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

/// A receiver that performs no real work.
///
/// Stands in for the external receiver binary in tests and in
/// `mock_receiver = true` deployments.
pub struct MockReceiver {
    behavior: MockBehavior,
}

impl MockReceiver {
    pub fn new(behavior: MockBehavior) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl Receiver for MockReceiver {
    async fn submit_payload(
        &mut self,
        _lease_path: &str,
        _payload: Bytes,
        _digest: &str,
        _header_size: u32,
    ) -> ReceiverResult<()> {
        self.behavior.metrics.payloads.fetch_add(1, Ordering::SeqCst);
        MockBehavior::scripted(&self.behavior.payload_error)
    }

    async fn commit(
        &mut self,
        lease_path: &str,
        _old_root_hash: &str,
        _new_root_hash: &str,
        _tag: &RepositoryTag,
    ) -> ReceiverResult<()> {
        let repository = lease_path.split('/').next().unwrap_or(lease_path);
        self.behavior.metrics.commit_entered(repository);
        if !self.behavior.commit_delay.is_zero() {
            tokio::time::sleep(self.behavior.commit_delay).await;
        }
        self.behavior.metrics.commit_left(repository);
        self.behavior.metrics.commits.fetch_add(1, Ordering::SeqCst);
        MockBehavior::scripted(&self.behavior.commit_error)
    }

    async fn quit(&mut self) -> ReceiverResult<()> {
        self.behavior.metrics.quits.fetch_add(1, Ordering::SeqCst);
        MockBehavior::scripted(&self.behavior.quit_error)
    }
}
