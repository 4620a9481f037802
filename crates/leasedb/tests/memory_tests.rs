//! Conformance tests for the in-memory lease store.

mod common;

use sluice_leasedb::MemoryLeaseStore;

macro_rules! conformance_test {
    ($name:ident) => {
        #[tokio::test]
        async fn $name() {
            let store = MemoryLeaseStore::new();
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
