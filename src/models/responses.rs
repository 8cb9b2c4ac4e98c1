//! Response DTOs for the HTTP gateway
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::connectivity::Connectivity;
use crate::service::{QueuedOperation, WriteStatus};

/// Response body for update and delete requests.
#[derive(Debug, Clone, Serialize)]
pub struct WriteResponse {
    pub collection: String,
    pub id: String,
    pub status: WriteStatus,
}

impl WriteResponse {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, status: WriteStatus) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            status,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Operations waiting in the offline queue
    pub queue_len: usize,
    pub connectivity: Connectivity,
    /// Replay failures currently recorded
    pub replay_failures: usize,
}

impl StatsResponse {
    pub fn new(
        cache: CacheStats,
        queue_len: usize,
        connectivity: Connectivity,
        replay_failures: usize,
    ) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            queue_len,
            connectivity,
            replay_failures,
        }
    }
}

/// Response body for the queue endpoint (GET /queue)
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub len: usize,
    pub operations: Vec<QueuedOperation>,
}

impl QueueResponse {
    pub fn new(operations: Vec<QueuedOperation>) -> Self {
        Self {
            len: operations.len(),
            operations,
        }
    }
}

/// Response body for PUT /connectivity
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityResponse {
    pub connectivity: Connectivity,
    /// Whether the request changed the state
    pub changed: bool,
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheResponse {
    pub message: String,
}

impl ClearCacheResponse {
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    pub connectivity: Connectivity,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(connectivity: Connectivity) -> Self {
        Self {
            status: "healthy".to_string(),
            connectivity,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
