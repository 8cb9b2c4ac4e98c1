//! FIFO Tracker Module
//!
//! Tracks insertion order for first-in-first-out cache eviction.

use std::collections::{BTreeMap, HashMap};

// == FIFO Tracker ==
/// Tracks insertion order for FIFO eviction.
///
/// Each key receives a monotonically increasing sequence number when it is
/// first inserted. The smallest live sequence number is the oldest key.
/// Re-inserting a tracked key keeps its original position.
#[derive(Debug, Default)]
pub struct FifoTracker {
    /// Sequence number -> key, ordered oldest first
    order: BTreeMap<u64, String>,
    /// Key -> sequence number
    positions: HashMap<String, u64>,
    /// Next sequence number to hand out
    next_seq: u64,
}

impl FifoTracker {
    // == Constructor ==
    /// Creates a new empty FIFO tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Records a key as inserted.
    ///
    /// Returns `true` if the key was not tracked before.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.positions.contains_key(key) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.to_string());
        self.positions.insert(key.to_string(), seq);
        true
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.positions.remove(key) {
            Some(seq) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the oldest-inserted key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.positions.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the oldest-inserted key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.order.values()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.order.clear();
        self.positions.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_new() {
        let fifo = FifoTracker::new();
        assert!(fifo.is_empty());
        assert_eq!(fifo.len(), 0);
    }

    #[test]
    fn test_fifo_insert_order() {
        let mut fifo = FifoTracker::new();

        assert!(fifo.insert("key1"));
        assert!(fifo.insert("key2"));
        assert!(fifo.insert("key3"));

        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.peek_oldest(), Some(&"key1".to_string()));
    }

    #[test]
    fn test_fifo_reinsert_keeps_position() {
        let mut fifo = FifoTracker::new();

        fifo.insert("key1");
        fifo.insert("key2");

        // Re-inserting must not move key1 to the back
        assert!(!fifo.insert("key1"));

        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.evict_oldest(), Some("key1".to_string()));
        assert_eq!(fifo.evict_oldest(), Some("key2".to_string()));
    }

    #[test]
    fn test_fifo_evict_empty() {
        let mut fifo = FifoTracker::new();
        assert_eq!(fifo.evict_oldest(), None);
    }

    #[test]
    fn test_fifo_remove() {
        let mut fifo = FifoTracker::new();

        fifo.insert("key1");
        fifo.insert("key2");
        fifo.insert("key3");

        assert!(fifo.remove("key2"));
        assert!(!fifo.remove("nonexistent"));

        assert_eq!(fifo.len(), 2);
        assert!(!fifo.contains("key2"));
        assert_eq!(
            fifo.keys().cloned().collect::<Vec<_>>(),
            vec!["key1".to_string(), "key3".to_string()]
        );
    }

    #[test]
    fn test_fifo_removed_key_reinserted_goes_to_back() {
        let mut fifo = FifoTracker::new();

        fifo.insert("a");
        fifo.insert("b");
        fifo.remove("a");
        fifo.insert("a");

        assert_eq!(fifo.evict_oldest(), Some("b".to_string()));
        assert_eq!(fifo.evict_oldest(), Some("a".to_string()));
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_fifo_clear() {
        let mut fifo = FifoTracker::new();
        fifo.insert("a");
        fifo.insert("b");
        fifo.clear();

        assert!(fifo.is_empty());
        assert!(fifo.insert("a"));
    }
}
