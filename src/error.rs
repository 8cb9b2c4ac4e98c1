//! Error types for the sync layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Failure reported by a [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Target document does not exist
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Backend cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),
}

// == Sync Error Enum ==
/// Unified error type for the sync layer.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Underlying fetch or query failed
    #[error("Remote read of {target} failed: {source}")]
    RemoteRead {
        target: String,
        #[source]
        source: StoreError,
    },

    /// Underlying mutation failed while online
    #[error("Remote write to {target} failed: {source}")]
    RemoteWrite {
        target: String,
        #[source]
        source: StoreError,
    },

    /// A queued operation failed during replay
    #[error("Replay of {operation} on {collection} failed: {reason}")]
    Replay {
        collection: String,
        operation: String,
        reason: String,
    },

    /// Actor is not allowed to perform the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::RemoteWrite {
                source: StoreError::NotFound(_),
                ..
            } => StatusCode::NOT_FOUND,
            SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SyncError::Forbidden(_) => StatusCode::FORBIDDEN,
            SyncError::RemoteRead { .. } | SyncError::RemoteWrite { .. } => {
                StatusCode::BAD_GATEWAY
            }
            SyncError::Replay { .. } | SyncError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the sync layer.
pub type Result<T> = std::result::Result<T, SyncError>;
