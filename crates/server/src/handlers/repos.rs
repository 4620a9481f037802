//! Repository administration handlers.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sluice_backend::GatewayError;

#[derive(Debug, Deserialize)]
pub struct SetRepoEnabledRequest {
    pub enabled: bool,
}

/// GET /api/v1/repos - List configured repositories.
pub async fn get_repos(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let repos = state.services.access.repos();
    Ok(Json(json!({"status": "ok", "data": repos})))
}

/// GET /api/v1/repos/{name} - Inspect one repository.
pub async fn get_repo(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    let repo = state
        .services
        .access
        .repo_config(&name)
        .ok_or(GatewayError::UnknownRepository(name))?;
    Ok(Json(json!({"status": "ok", "data": repo})))
}

/// PUT /api/v1/repos/{name} - Enable or disable writes.
///
/// Disabling blocks new leases but leaves issued leases untouched;
/// use the bulk-cancel endpoint to revoke them.
pub async fn set_repo_enabled(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<SetRepoEnabledRequest>,
) -> ApiResult<Json<Value>> {
    state.services.access.set_repo_enabled(&name, body.enabled)?;
    tracing::info!(repository = %name, enabled = body.enabled, "repository toggled");
    Ok(Json(json!({"status": "ok"})))
}

/// DELETE /api/v1/repos/{name}/leases - Bulk-cancel a repository's leases.
pub async fn cancel_repo_leases(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>> {
    // Reject unknown repositories before touching the store.
    state
        .services
        .access
        .repo_config(&name)
        .ok_or_else(|| GatewayError::UnknownRepository(name.clone()))?;

    let cancelled = state.services.cancel_leases_under(&name).await?;
    Ok(Json(json!({"status": "ok", "cancelled": cancelled})))
}
