//! Payload submission handler.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Request, State};
use axum::Json;
use serde_json::{json, Value};

/// Header carrying the payload content digest.
pub const PAYLOAD_DIGEST_HEADER: &str = "x-payload-digest";

/// Header giving the byte length of the catalog header prepended to
/// the payload body.
pub const HEADER_SIZE_HEADER: &str = "x-header-size";

fn required_header<'a>(req: &'a Request, name: &str) -> ApiResult<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {name} header")))
}

/// POST /api/v1/payloads/{token} - Stream a payload against a lease.
///
/// The body is `application/octet-stream`; the receiver contract
/// requires the whole payload buffered before dispatch.
pub async fn submit_payload(
    State(state): State<AppState>,
    Path(token): Path<String>,
    req: Request,
) -> ApiResult<Json<Value>> {
    let digest = required_header(&req, PAYLOAD_DIGEST_HEADER)?.to_string();
    let header_size: u32 = required_header(&req, HEADER_SIZE_HEADER)?
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {HEADER_SIZE_HEADER} header")))?;

    let max_size = state.services.config.server.max_payload_size;
    let payload = axum::body::to_bytes(req.into_body(), max_size)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read payload: {e}")))?;

    if (header_size as usize) > payload.len() {
        return Err(ApiError::BadRequest(format!(
            "{HEADER_SIZE_HEADER} {header_size} exceeds payload of {} bytes",
            payload.len()
        )));
    }

    state
        .services
        .submit_payload(&token, payload, &digest, header_size)
        .await?;

    Ok(Json(json!({"status": "ok"})))
}
