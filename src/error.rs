use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// ApiError
///
/// The single structured error channel for the application. Every failure path
/// (malformed input, missing records, auth rejections, persistence failures)
/// flows through this enum and is rendered as a JSON `{"message": …}` body with
/// the matching HTTP status. Handlers never write ad hoc status codes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or unusable client input.
    #[error("{0}")]
    BadRequest(String),

    /// A referenced record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The caller could not be authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is authenticated but lacks the required role.
    #[error("{0}")]
    Forbidden(String),

    /// A persistence failure from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An internal error with a human-readable message.
    #[error("{0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

// Constructor helpers mirroring the error-reporting surface the handlers use
// (`ApiError::bad_request("…")` reads like the route-level contract).
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            // Persistence and internal failures are logged in full but sanitized
            // on the wire.
            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({ "message": message });

        (status, Json(body)).into_response()
    }
}
