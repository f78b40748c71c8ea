//! Axum-specific error type and the `CoreError` → HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meetscribe_core::CoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream collaborator failed: {0}")]
    BadGateway(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(id) => Self::NotFound(format!("file not found: {id}")),
            CoreError::Validation(msg) => Self::BadRequest(msg),
            CoreError::Conflict(msg) => Self::Conflict(msg),
            CoreError::Persistence(msg) => Self::Internal(format!("persistence: {msg}")),
            CoreError::ExternalService(msg) => Self::BadGateway(msg),
            CoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
