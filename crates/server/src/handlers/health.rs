//! Health check handler.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// GET /api/v1/health - Liveness probe, intentionally unauthenticated.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .services
        .leases
        .health_check()
        .await
        .map_err(sluice_backend::GatewayError::from)?;
    Ok(Json(json!({"status": "ok"})))
}
