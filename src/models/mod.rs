//! Models for documents and the HTTP gateway
//!
//! The document model is shared by every layer; the request and response
//! DTOs are only used by the gateway.

mod document;
pub mod requests;
pub mod responses;

pub use document::{
    is_placeholder_id, placeholder_id, ChangeKind, Document, DocumentChange, Fields, WatchTarget,
    ID_FIELD, PLACEHOLDER_PREFIX,
};
pub use requests::{CollectionQuery, ConnectivityRequest};
pub use responses::{
    ClearCacheResponse, ConnectivityResponse, ErrorResponse, HealthResponse, QueueResponse, StatsResponse,
    WriteResponse,
};
