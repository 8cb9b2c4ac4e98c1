//! Cache Store Module
//!
//! Bounded cache combining HashMap storage with FIFO tracking and TTL expiration.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, FifoTracker};

// == Cache Store ==
/// Bounded key/value cache with per-entry TTL and strict FIFO eviction.
///
/// Values handed out are clones; callers never hold references into the store.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion order tracker
    fifo: FifoTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Default TTL in milliseconds for entries without explicit TTL
    default_ttl_ms: u64,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and default TTL.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the cache can hold
    /// * `default_ttl_ms` - Default TTL in milliseconds for entries without explicit TTL
    pub fn new(max_entries: usize, default_ttl_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            fifo: FifoTracker::new(),
            stats: CacheStats::new(),
            max_entries,
            default_ttl_ms,
        }
    }

    // == Set ==
    /// Stores a value under `key`, overwriting any previous value and resetting its TTL.
    ///
    /// If the key is new and the cache is at capacity, the oldest-inserted entry
    /// is evicted first. Overwrites keep the key's original insertion position.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl_ms: Option<u64>) {
        let key = key.into();

        if self.max_entries == 0 {
            return;
        }

        let is_overwrite = self.entries.contains_key(&key);
        if !is_overwrite && self.entries.len() >= self.max_entries {
            if let Some(evicted_key) = self.fifo.evict_oldest() {
                self.entries.remove(&evicted_key);
                self.stats.record_eviction();
                debug!(key = %evicted_key, "Evicted oldest cache entry");
            }
        }

        let entry = CacheEntry::new(value, ttl_ms.unwrap_or(self.default_ttl_ms));
        self.entries.insert(key.clone(), entry);
        self.fifo.insert(&key);

        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves a snapshot of the value stored under `key`.
    ///
    /// Expired entries are removed on access and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.live_entry(key) {
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Returns whether a live entry exists for `key`.
    ///
    /// Applies the same expiry rule as [`get`](Self::get) without touching hit/miss counters.
    pub fn has(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    // == Delete ==
    /// Removes an entry by key. Returns `true` if an entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.fifo.remove(key);
            self.stats.record_invalidation();
            self.stats.set_total_entries(self.entries.len());
            true
        } else {
            false
        }
    }

    // == Clear ==
    /// Removes every entry. Counters other than the entry count are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.fifo.clear();
        self.stats.set_total_entries(0);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
            self.fifo.remove(&key);
        }

        self.stats.record_expirations(count);
        self.stats.set_total_entries(self.entries.len());
        count
    }

    /// Keys in insertion order, oldest first. Expired entries are included
    /// until they are accessed or cleaned up.
    pub fn keys(&self) -> Vec<String> {
        self.fifo.keys().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.remove(key);
            self.fifo.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
            return None;
        }
        self.entries.get(key)
    }
}
