//! Core error taxonomy. The HTTP mapping is applied one layer up in
//! `meetscribe-axum`.

use thiserror::Error;

use crate::domain::FileId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("file not found: {0}")]
    NotFound(FileId),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("external collaborator failed: {0}")]
    ExternalService(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    #[must_use]
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
