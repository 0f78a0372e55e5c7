//! Error types for the storage subsystem
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::models::ErrorResponse;

// == Storage Error Enum ==
/// Unified error type for every store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Host store is inaccessible (disabled by user or policy)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Write rejected even after the expiry-sweep retry
    #[error("Storage capacity exceeded while writing '{0}'")]
    CapacityExceeded(String),

    /// Stored value failed to parse
    #[error("Corrupted entry '{key}': {reason}")]
    Corrupted { key: String, reason: String },

    /// Encrypted store used without a key
    #[error("Encryption key not configured")]
    NotConfigured,

    /// Encryption or decryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Value could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Host store failed for a reason other than capacity
    #[error("Backend error: {0}")]
    Backend(String),

    /// Export snapshot could not be imported
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Key or action does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable argument
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl StorageError {
    pub(crate) fn corrupted(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Corrupted {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<BackendError> for StorageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Disabled(reason) => StorageError::Unavailable(reason),
            other => StorageError::Backend(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        let status = match &self {
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::InvalidRequest(_) | StorageError::InvalidSnapshot(_) => {
                StatusCode::BAD_REQUEST
            }
            StorageError::CapacityExceeded(_) => StatusCode::INSUFFICIENT_STORAGE,
            StorageError::Unavailable(_) | StorageError::NotConfigured => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            StorageError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StorageError::Corrupted { .. }
            | StorageError::Encryption(_)
            | StorageError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the storage subsystem.
pub type Result<T> = std::result::Result<T, StorageError>;
