//! Conformance scenarios shared by every lease store backend.

use sluice_core::{LeasePath, LeaseState, LeaseToken};
use sluice_leasedb::{CommitOutcome, LeaseStore, StoreError};
use time::{Duration, OffsetDateTime};

const TTL: Duration = Duration::seconds(3600);

fn path(s: &str) -> LeasePath {
    LeasePath::parse(s).unwrap()
}

pub async fn lease_roundtrip(store: &dyn LeaseStore) {
    let token = store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();

    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.token, token);
    assert_eq!(lease.key_id, "k1");
    assert_eq!(lease.lease_path.as_str(), "repoA/x");
    assert_eq!(lease.protocol_version, 2);
    assert_eq!(lease.state, LeaseState::Active);
    assert_eq!(lease.expires - lease.issued, TTL);

    let leases = store.get_leases().await.unwrap();
    assert_eq!(leases.len(), 1);
    assert!(leases.contains_key("repoA/x"));
}

pub async fn unknown_token_is_invalid(store: &dyn LeaseStore) {
    let bogus = LeaseToken::parse("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap();
    assert!(matches!(
        store.get_lease(&bogus).await,
        Err(StoreError::InvalidToken)
    ));
    assert!(matches!(
        store.cancel_lease(&bogus).await,
        Err(StoreError::InvalidToken)
    ));
    assert!(matches!(
        store.begin_commit(&bogus).await,
        Err(StoreError::InvalidToken)
    ));
}

pub async fn overlapping_paths_are_busy(store: &dyn LeaseStore) {
    store
        .new_lease("k1", &path("repoA/foo"), 2, TTL)
        .await
        .unwrap();

    // Below, above, and equal all conflict.
    for conflicting in ["repoA/foo/bar", "repoA", "repoA/foo"] {
        match store.new_lease("k2", &path(conflicting), 2, TTL).await {
            Err(StoreError::PathBusy { remaining }) => {
                assert!(remaining <= TTL);
                assert!(remaining > TTL - Duration::seconds(60));
            }
            other => panic!("expected PathBusy for {conflicting}, got {other:?}"),
        }
    }

    // A segment-boundary near-miss does not conflict.
    store
        .new_lease("k2", &path("repoA/foobar"), 2, TTL)
        .await
        .unwrap();
}

pub async fn disjoint_paths_coexist(store: &dyn LeaseStore) {
    store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();
    store
        .new_lease("k2", &path("repoA/y"), 2, TTL)
        .await
        .unwrap();
    store
        .new_lease("k1", &path("repoB/x"), 2, TTL)
        .await
        .unwrap();

    assert_eq!(store.get_leases().await.unwrap().len(), 3);
}

pub async fn cancel_frees_the_path(store: &dyn LeaseStore) {
    let token = store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();

    store.cancel_lease(&token).await.unwrap();
    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.state, LeaseState::Cancelled);

    // Terminal states are sticky.
    assert!(matches!(
        store.cancel_lease(&token).await,
        Err(StoreError::InvalidState(LeaseState::Cancelled))
    ));

    // The path is free for the next writer.
    store
        .new_lease("k2", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();
}

pub async fn commit_lifecycle_success(store: &dyn LeaseStore) {
    let token = store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();

    let lease = store.begin_commit(&token).await.unwrap();
    assert_eq!(lease.state, LeaseState::Committing);

    // Committing leases still hold the path.
    assert!(matches!(
        store.new_lease("k2", &path("repoA/x/y"), 2, TTL).await,
        Err(StoreError::PathBusy { .. })
    ));

    // A second commit on the same lease is refused.
    assert!(matches!(
        store.begin_commit(&token).await,
        Err(StoreError::InvalidState(LeaseState::Committing))
    ));

    store
        .finish_commit(&token, CommitOutcome::Success)
        .await
        .unwrap();
    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.state, LeaseState::Committed);

    store
        .new_lease("k2", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();
}

pub async fn commit_failure_cancels(store: &dyn LeaseStore) {
    let token = store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();

    store.begin_commit(&token).await.unwrap();
    store
        .finish_commit(&token, CommitOutcome::Failure)
        .await
        .unwrap();

    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.state, LeaseState::Cancelled);
}

pub async fn finish_commit_requires_committing(store: &dyn LeaseStore) {
    let token = store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();

    assert!(matches!(
        store.finish_commit(&token, CommitOutcome::Success).await,
        Err(StoreError::InvalidState(LeaseState::Active))
    ));
}

pub async fn expired_lease_cannot_commit(store: &dyn LeaseStore) {
    let token = store
        .new_lease("k1", &path("repoA/x"), 2, Duration::seconds(-1))
        .await
        .unwrap();

    assert!(matches!(
        store.begin_commit(&token).await,
        Err(StoreError::ExpiredLease)
    ));

    // Until the reaper runs the record stays active.
    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.state, LeaseState::Active);

    let reaped = store.reap_expired(OffsetDateTime::now_utc()).await.unwrap();
    assert_eq!(reaped, 1);
    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.state, LeaseState::Expired);

    // Reaping freed the path.
    store
        .new_lease("k2", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();
}

pub async fn reaper_collects_stuck_committing(store: &dyn LeaseStore) {
    let token = store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();
    store.begin_commit(&token).await.unwrap();

    // Simulate a gateway crash mid-commit: the deadline passes while
    // the lease is still committing.
    let lease = store.get_lease(&token).await.unwrap();
    let reaped = store
        .reap_expired(lease.expires + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(reaped, 1);

    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.state, LeaseState::Expired);
}

pub async fn reap_ignores_live_and_terminal(store: &dyn LeaseStore) {
    let live = store
        .new_lease("k1", &path("repoA/live"), 2, TTL)
        .await
        .unwrap();
    let done = store
        .new_lease("k1", &path("repoA/done"), 2, TTL)
        .await
        .unwrap();
    store.cancel_lease(&done).await.unwrap();

    let reaped = store.reap_expired(OffsetDateTime::now_utc()).await.unwrap();
    assert_eq!(reaped, 0);
    assert_eq!(
        store.get_lease(&live).await.unwrap().state,
        LeaseState::Active
    );
    assert_eq!(
        store.get_lease(&done).await.unwrap().state,
        LeaseState::Cancelled
    );
}

pub async fn cancel_leases_under_scopes_to_repo(store: &dyn LeaseStore) {
    let a1 = store
        .new_lease("k1", &path("repoA/x"), 2, TTL)
        .await
        .unwrap();
    let a2 = store
        .new_lease("k2", &path("repoA/y"), 2, TTL)
        .await
        .unwrap();
    let b = store
        .new_lease("k1", &path("repoB/x"), 2, TTL)
        .await
        .unwrap();

    let cancelled = store.cancel_leases_under("repoA").await.unwrap();
    assert_eq!(cancelled, 2);

    assert_eq!(
        store.get_lease(&a1).await.unwrap().state,
        LeaseState::Cancelled
    );
    assert_eq!(
        store.get_lease(&a2).await.unwrap().state,
        LeaseState::Cancelled
    );
    assert_eq!(store.get_lease(&b).await.unwrap().state, LeaseState::Active);

    // "repoAx" is not under "repoA"; only segment-aligned prefixes count.
    let c = store
        .new_lease("k1", &path("repoAx/z"), 2, TTL)
        .await
        .unwrap();
    assert_eq!(store.cancel_leases_under("repoA").await.unwrap(), 0);
    assert_eq!(store.get_lease(&c).await.unwrap().state, LeaseState::Active);
}

pub async fn tokens_are_unique(store: &dyn LeaseStore) {
    let mut seen = std::collections::HashSet::new();
    for i in 0..32 {
        let token = store
            .new_lease("k1", &path(&format!("repoA/p{i}")), 2, TTL)
            .await
            .unwrap();
        assert!(seen.insert(token.as_str().to_string()));
    }
}
