//! HTTP error type for ensayo-cms
//!
//! Every failure leaves a handler as `{"error": {"code", "message"}}` with a
//! status that tells NotFound, validation and server-side failures apart.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Target id does not resolve (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or inconsistent request fields (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Persistence operation rejected (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Asset storage or presigning failed (500)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<ensayo_common::Error> for ApiError {
    fn from(err: ensayo_common::Error) -> Self {
        use ensayo_common::Error as E;
        match err {
            E::NotFound(msg) => ApiError::NotFound(msg),
            E::Validation(msg) => ApiError::BadRequest(msg),
            E::Database(e) => ApiError::Storage(e.to_string()),
            E::Io(e) => ApiError::Storage(e.to_string()),
            E::Upstream(msg) | E::Config(msg) => ApiError::Upstream(msg),
            E::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ensayo_common::Error::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, "{}", self);
        } else {
            warn!(code, "{}", self);
        }

        let message = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Storage(msg)
            | ApiError::Upstream(msg)
            | ApiError::Internal(msg) => msg,
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
