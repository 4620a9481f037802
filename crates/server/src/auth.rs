//! Request identity middleware.
//!
//! Signature verification happens upstream; by the time a request
//! reaches the gateway core, the first field of the `Authorization`
//! header is a trusted key ID.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// The key ID asserted by the upstream access middleware.
#[derive(Clone, Debug)]
pub struct KeyId(pub String);

/// Per-request correlation ID.
#[derive(Clone, Debug)]
pub struct RequestId(pub Uuid);

/// Extract the key ID from the `Authorization` header, if present.
fn extract_key_id(req: &Request) -> Option<KeyId> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().next())
        .filter(|id| !id.is_empty())
        .map(|id| KeyId(id.to_string()))
}

/// Attach the key ID and a request ID to every request; echo the
/// request ID back in `x-request-id`.
pub async fn identity_middleware(mut req: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    let id_header = request_id.0.to_string();

    if let Some(key_id) = extract_key_id(&req) {
        req.extensions_mut().insert(key_id);
    }
    req.extensions_mut().insert(request_id);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id_header) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Reject requests that carry no key ID with 401. Applied to the
/// lease and payload routes; health and repository administration
/// stay open.
pub async fn require_key_middleware(
    req: Request,
    next: Next,
) -> Result<Response, crate::error::ApiError> {
    if req.extensions().get::<KeyId>().is_none() {
        return Err(crate::error::ApiError::Unauthorized(
            "missing authorization".to_string(),
        ));
    }
    Ok(next.run(req).await)
}
