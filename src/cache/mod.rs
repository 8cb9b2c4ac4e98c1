//! Cache Module
//!
//! Provides a bounded in-memory read cache with TTL expiration and FIFO eviction.

mod entry;
mod fifo;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use fifo::FifoTracker;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Cache Keys ==
/// Cache key for a single document read.
pub fn document_key(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

/// Cache key for a full collection read.
pub fn collection_key(collection: &str) -> String {
    format!("collection/{}", collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespaces() {
        assert_eq!(document_key("lessons", "1"), "lessons/1");
        assert_eq!(collection_key("lessons"), "collection/lessons");
    }
}
