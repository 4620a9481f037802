//! Common test utilities and fixtures.

use sluice_backend::{AccessConfig, KeyConfig, KeyPermission, RepositoryConfig, Services};
use sluice_core::GatewayConfig;
use sluice_leasedb::{LeaseStore, MemoryLeaseStore};
use sluice_receiver::{MockBehavior, Pool, ReceiverSpawner};
use sluice_server::{create_router, AppState};
use std::sync::Arc;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub services: Arc<Services>,
    pub behavior: MockBehavior,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with a well-behaved mock receiver.
    pub async fn new() -> Self {
        Self::with_behavior(MockBehavior::default()).await
    }

    /// Create a test server with scripted receiver behavior.
    pub async fn with_behavior(behavior: MockBehavior) -> Self {
        let access = AccessConfig::from_parts(
            vec![
                KeyConfig {
                    id: "k1".to_string(),
                    repositories: vec![
                        KeyPermission {
                            repository: "repoA".to_string(),
                            path: "/".to_string(),
                        },
                        KeyPermission {
                            repository: "repoB".to_string(),
                            path: "/".to_string(),
                        },
                    ],
                },
                KeyConfig {
                    id: "k2".to_string(),
                    repositories: vec![KeyPermission {
                        repository: "repoA".to_string(),
                        path: "/team".to_string(),
                    }],
                },
            ],
            vec![
                RepositoryConfig {
                    name: "repoA".to_string(),
                    enabled: true,
                },
                RepositoryConfig {
                    name: "repoB".to_string(),
                    enabled: true,
                },
            ],
        );

        let leases: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
        let pool =
            Pool::start(ReceiverSpawner::Mock(behavior.clone()), 2).expect("Failed to start pool");
        let services = Arc::new(Services::with_parts(
            access,
            leases,
            pool,
            GatewayConfig::for_testing(),
        ));

        let router = create_router(AppState::new(services.clone()));

        Self {
            router,
            services,
            behavior,
        }
    }
}
