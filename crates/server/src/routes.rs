//! Route configuration.

use crate::auth::{identity_middleware, require_key_middleware};
use crate::handlers;
use crate::state::AppState;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Lease and payload routes require a key ID (401 without one).
    let write_routes = Router::new()
        .route(
            "/api/v1/leases",
            post(handlers::new_lease).get(handlers::get_leases),
        )
        .route(
            "/api/v1/leases/{token}",
            get(handlers::get_lease)
                .post(handlers::commit_lease)
                .delete(handlers::cancel_lease),
        )
        .route("/api/v1/payloads/{token}", post(handlers::submit_payload))
        .route_layer(middleware::from_fn(require_key_middleware));

    let open_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers)
        .route("/api/v1/health", get(handlers::health_check))
        // Repository administration
        .route("/api/v1/repos", get(handlers::get_repos))
        .route(
            "/api/v1/repos/{name}",
            get(handlers::get_repo).put(handlers::set_repo_enabled),
        )
        .route(
            "/api/v1/repos/{name}/leases",
            delete(handlers::cancel_repo_leases),
        );

    write_routes
        .merge(open_routes)
        .layer(middleware::from_fn(identity_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
