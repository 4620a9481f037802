//! Conformance tests for the SQLite lease store.

mod common;

use sluice_leasedb::{LeaseStore, SqliteLeaseStore};
use tempfile::TempDir;

async fn sqlite_store() -> (TempDir, SqliteLeaseStore) {
    let temp = tempfile::tempdir().expect("Failed to create temp directory");
    let store = SqliteLeaseStore::new(temp.path().join("leases.db"))
        .await
        .expect("Failed to open lease database");
    (temp, store)
}

macro_rules! conformance_test {
    ($name:ident) => {
        #[tokio::test]
        async fn $name() {
            let (_temp, store) = sqlite_store().await;
            common::$name(&store).await;
        }
    };
}

conformance_test!(lease_roundtrip);
conformance_test!(unknown_token_is_invalid);
conformance_test!(overlapping_paths_are_busy);
conformance_test!(disjoint_paths_coexist);
conformance_test!(cancel_frees_the_path);
conformance_test!(commit_lifecycle_success);
conformance_test!(commit_failure_cancels);
conformance_test!(finish_commit_requires_committing);
conformance_test!(expired_lease_cannot_commit);
conformance_test!(reaper_collects_stuck_committing);
conformance_test!(reap_ignores_live_and_terminal);
conformance_test!(cancel_leases_under_scopes_to_repo);
conformance_test!(tokens_are_unique);

#[tokio::test]
async fn leases_survive_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("leases.db");

    let token = {
        let store = SqliteLeaseStore::new(&db_path).await.unwrap();
        let path = sluice_core::LeasePath::parse("repoA/x").unwrap();
        let token = store
            .new_lease("k1", &path, 2, time::Duration::seconds(3600))
            .await
            .unwrap();
        store.close().await.unwrap();
        token
    };

    let store = SqliteLeaseStore::new(&db_path).await.unwrap();
    let lease = store.get_lease(&token).await.unwrap();
    assert_eq!(lease.lease_path.as_str(), "repoA/x");
    assert_eq!(lease.state, sluice_core::LeaseState::Active);
}
