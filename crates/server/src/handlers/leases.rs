//! Lease protocol handlers.

use crate::auth::KeyId;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sluice_core::{Lease, RepositoryTag};
use time::OffsetDateTime;

/// Client-declared API version.
///
/// Some clients send the field as a JSON string; unparseable values
/// fall through to 0 and are rejected by version negotiation.
#[derive(Clone, Copy, Debug)]
pub struct ApiVersion(pub u32);

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let version = match &value {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(Self(version.unwrap_or(0)))
    }
}

#[derive(Debug, Deserialize)]
pub struct NewLeaseRequest {
    pub path: String,
    pub api_version: ApiVersion,
}

#[derive(Debug, Deserialize)]
pub struct CommitLeaseRequest {
    #[serde(default)]
    pub old_root_hash: String,
    pub new_root_hash: String,
    #[serde(flatten)]
    pub tag: RepositoryTag,
}

/// A lease as shown to clients. The token is the lease's credential
/// and never appears in listings.
#[derive(Debug, Serialize)]
pub struct LeaseView {
    pub key_id: String,
    pub lease_path: String,
    pub state: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub protocol_version: u32,
}

impl From<&Lease> for LeaseView {
    fn from(lease: &Lease) -> Self {
        Self {
            key_id: lease.key_id.clone(),
            lease_path: lease.lease_path.as_str().to_string(),
            state: lease.state.to_string(),
            issued: lease.issued,
            expires: lease.expires,
            protocol_version: lease.protocol_version,
        }
    }
}

/// POST /api/v1/leases - Request a new lease.
///
/// The route layer already rejected requests without a key ID.
pub async fn new_lease(
    State(state): State<AppState>,
    Extension(KeyId(key_id)): Extension<KeyId>,
    Json(body): Json<NewLeaseRequest>,
) -> ApiResult<Json<Value>> {
    let grant = state
        .services
        .new_lease(&key_id, &body.path, body.api_version.0)
        .await?;

    Ok(Json(json!({
        "status": "ok",
        "session_token": grant.token.as_str(),
        "max_api_version": grant.api_version,
    })))
}

/// GET /api/v1/leases - Snapshot of live leases.
pub async fn get_leases(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let leases = state.services.get_leases().await?;
    let data: serde_json::Map<String, Value> = leases
        .iter()
        .map(|(path, lease)| {
            (
                path.clone(),
                serde_json::to_value(LeaseView::from(lease)).unwrap_or(Value::Null),
            )
        })
        .collect();

    Ok(Json(json!({"status": "ok", "data": data})))
}

/// GET /api/v1/leases/{token} - Inspect one lease.
pub async fn get_lease(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<Value>> {
    let lease = state.services.get_lease(&token).await?;
    let view = serde_json::to_value(LeaseView::from(&lease))
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(json!({"data": view})))
}

/// DELETE /api/v1/leases/{token} - Cancel a lease.
pub async fn cancel_lease(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<Value>> {
    state.services.cancel_lease(&token).await?;
    Ok(Json(json!({"status": "ok"})))
}

/// POST /api/v1/leases/{token} - Commit a lease.
pub async fn commit_lease(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<CommitLeaseRequest>,
) -> ApiResult<Json<Value>> {
    state
        .services
        .commit_lease(&token, &body.old_root_hash, &body.new_root_hash, body.tag)
        .await?;
    Ok(Json(json!({"status": "ok"})))
}
