//! Error types for the cache library
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for stores, the cache repository and the HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend connection or command failure. Never retried internally.
    #[error("Store unavailable ({store}): {reason}")]
    StoreUnavailable { store: String, reason: String },

    /// Key not found in cache
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Some keys under a flushed tag could not be deleted
    #[error("Tag flush incomplete: {} deleted, {} failed", deleted.len(), failed.len())]
    TagOperationPartialFailure {
        deleted: Vec<String>,
        failed: Vec<String>,
    },

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration value could not be understood
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Domain record missing from a repository
    #[error("Record not found: {0}")]
    RecordNotFound(u64),

    /// Write would break a uniqueness rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Builds a `StoreUnavailable` error from any backend error.
    pub fn unavailable(store: &str, reason: impl std::fmt::Display) -> Self {
        CacheError::StoreUnavailable {
            store: store.to_string(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CacheError::KeyNotFound(_) | CacheError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Conflict(_) => StatusCode::CONFLICT,
            CacheError::StoreUnavailable { .. }
            | CacheError::TagOperationPartialFailure { .. }
            | CacheError::Serialization(_)
            | CacheError::InvalidConfig(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache library.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_server_error() {
        let err = CacheError::unavailable("redis", "connection refused");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("redis"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_partial_failure_message_counts_keys() {
        let err = CacheError::TagOperationPartialFailure {
            deleted: vec!["a".to_string(), "b".to_string()],
            failed: vec!["c".to_string()],
        };
        assert_eq!(err.to_string(), "Tag flush incomplete: 2 deleted, 1 failed");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CacheError::RecordNotFound(7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CacheError::Conflict("priority".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CacheError::InvalidRequest("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
