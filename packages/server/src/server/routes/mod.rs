// HTTP routes
pub mod account;
pub mod auth;
pub mod health;
pub mod notify;

pub use account::*;
pub use auth::*;
pub use health::*;
pub use notify::*;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::common::ServiceError;

/// Map service errors onto HTTP responses. The body carries only the
/// stable error code - storage details never leak to the caller.
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServiceError::Validation { code } => (StatusCode::BAD_REQUEST, *code),
            ServiceError::NotFound => (StatusCode::NOT_FOUND, "not-found"),
            ServiceError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ServiceError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "retry"),
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, code, "request rejected");
        }

        (status, Json(json!({ "error": code }))).into_response()
    }
}

/// 401 with a stable code; used for auth outcomes that are values, not
/// errors (wrong password, spent token).
pub(crate) fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}
