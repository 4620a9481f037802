//! API error types and wire mapping.
//!
//! Business-logic failures travel as HTTP 200 with an error body;
//! status codes are reserved for malformed requests (400) and
//! infrastructure failures (500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sluice_backend::GatewayError;
use sluice_leasedb::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "reason": reason})),
            )
                .into_response(),

            Self::Unauthorized(reason) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"status": "error", "reason": reason})),
            )
                .into_response(),

            Self::Gateway(e) => match e {
                GatewayError::Store(StoreError::PathBusy { remaining }) => Json(json!({
                    "status": "path_busy",
                    "time_remaining": remaining.as_seconds_f64().max(0.0),
                }))
                .into_response(),

                GatewayError::Store(StoreError::InvalidToken) => {
                    Json(json!({"status": "error", "reason": "invalid_token"})).into_response()
                }

                GatewayError::Malformed(e) => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"status": "error", "reason": e.to_string()})),
                )
                    .into_response(),

                GatewayError::Store(
                    e @ (StoreError::Database(_) | StoreError::Corrupt(_) | StoreError::Config(_)),
                ) => {
                    tracing::error!(error = %e, "lease store failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"status": "error", "reason": e.to_string()})),
                    )
                        .into_response()
                }

                GatewayError::AccessConfig(reason) => {
                    tracing::error!(reason, "access configuration failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"status": "error", "reason": reason})),
                    )
                        .into_response()
                }

                // Remaining kinds are business-logic outcomes.
                other => {
                    Json(json!({"status": "error", "reason": other.to_string()})).into_response()
                }
            },
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
