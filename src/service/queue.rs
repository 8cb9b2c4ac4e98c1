//! Offline Queue
//!
//! Ordered list of mutations deferred while connectivity was unavailable.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{is_placeholder_id, Fields};

// == Pending Operation ==
/// A mutation waiting to be replayed against the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PendingOperation {
    Add {
        collection: String,
        /// Id returned to the caller until the server assigns a real one
        placeholder_id: String,
        payload: Fields,
    },
    Update {
        collection: String,
        id: String,
        patch: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl PendingOperation {
    pub fn collection(&self) -> &str {
        match self {
            Self::Add { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Document id the operation targets (the placeholder for adds).
    pub fn document_id(&self) -> &str {
        match self {
            Self::Add { placeholder_id, .. } => placeholder_id,
            Self::Update { id, .. } | Self::Delete { id, .. } => id,
        }
    }

    /// Placeholder id this operation needs resolved before it can run.
    pub fn depends_on(&self) -> Option<&str> {
        match self {
            Self::Add { .. } => None,
            Self::Update { id, .. } | Self::Delete { id, .. } => {
                Some(id.as_str()).filter(|id| is_placeholder_id(id))
            }
        }
    }

    /// Whether both operations target the same document.
    pub fn same_target(&self, other: &PendingOperation) -> bool {
        self.collection() == other.collection() && self.document_id() == other.document_id()
    }

    /// Whether this is the add that introduced `placeholder`.
    pub fn is_add_for(&self, placeholder: &str) -> bool {
        matches!(self, Self::Add { placeholder_id, .. } if placeholder_id == placeholder)
    }

    /// Rewrites a placeholder target to its server id if one is known.
    pub fn resolve_ids(&mut self, ids: &HashMap<String, String>) {
        if let Self::Update { id, .. } | Self::Delete { id, .. } = self {
            if let Some(server_id) = ids.get(id.as_str()) {
                *id = server_id.clone();
            }
        }
    }
}

// == Queued Operation ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedOperation {
    #[serde(flatten)]
    pub operation: PendingOperation,
    /// Failed replay attempts so far
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedOperation {
    pub fn new(operation: PendingOperation) -> Self {
        Self {
            operation,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}

// == Offline Queue ==
/// FIFO of queued operations.
///
/// Adds taken off the queue for replay stay tracked as in flight until they
/// are settled or requeued, so their placeholder never looks unknown.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    operations: VecDeque<QueuedOperation>,
    in_flight: HashSet<String>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: PendingOperation) {
        self.operations.push_back(QueuedOperation::new(operation));
    }

    /// Takes the head operation. An add is marked in flight.
    pub fn pop_front(&mut self) -> Option<QueuedOperation> {
        let next = self.operations.pop_front()?;
        if let PendingOperation::Add { placeholder_id, .. } = &next.operation {
            self.in_flight.insert(placeholder_id.clone());
        }
        Some(next)
    }

    /// Clears the in-flight mark of an add that was applied or dropped.
    pub fn settle(&mut self, placeholder: &str) {
        self.in_flight.remove(placeholder);
    }

    /// Puts operations back at the head of the queue, keeping their relative order.
    pub fn requeue_front(&mut self, operations: Vec<QueuedOperation>) {
        for op in operations.into_iter().rev() {
            if let PendingOperation::Add { placeholder_id, .. } = &op.operation {
                self.in_flight.remove(placeholder_id);
            }
            self.operations.push_front(op);
        }
    }

    /// Whether an add for `placeholder` is still waiting or being replayed.
    pub fn has_add_for(&self, placeholder: &str) -> bool {
        self.in_flight.contains(placeholder)
            || self
                .operations
                .iter()
                .any(|q| q.operation.is_add_for(placeholder))
    }

    pub fn snapshot(&self) -> Vec<QueuedOperation> {
        self.operations.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add(placeholder: &str) -> PendingOperation {
        PendingOperation::Add {
            collection: "notes".into(),
            placeholder_id: placeholder.into(),
            payload: Fields::new(),
        }
    }

    fn delete(id: &str) -> PendingOperation {
        PendingOperation::Delete {
            collection: "notes".into(),
            id: id.into(),
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = OfflineQueue::new();
        queue.push(add("pending_a"));
        queue.push(delete("x"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().unwrap().operation.kind(), "add");
        assert_eq!(queue.pop_front().unwrap().operation.kind(), "delete");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_front_preserves_order() {
        let mut queue = OfflineQueue::new();
        queue.push(delete("c"));

        let failed = vec![
            QueuedOperation::new(delete("a")),
            QueuedOperation::new(delete("b")),
        ];
        queue.requeue_front(failed);

        let order: Vec<String> = queue
            .snapshot()
            .iter()
            .map(|q| q.operation.document_id().to_string())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_placeholder_dependencies() {
        assert_eq!(delete("pending_abc").depends_on(), Some("pending_abc"));
        assert_eq!(delete("server1").depends_on(), None);
        assert_eq!(add("pending_abc").depends_on(), None);
        assert!(add("pending_abc").is_add_for("pending_abc"));

        let mut queue = OfflineQueue::new();
        queue.push(add("pending_abc"));
        assert!(queue.has_add_for("pending_abc"));
        assert!(!queue.has_add_for("pending_zzz"));
    }

    #[test]
    fn test_popped_add_stays_known_until_settled() {
        let mut queue = OfflineQueue::new();
        queue.push(add("pending_abc"));

        let popped = queue.pop_front().unwrap();
        assert!(queue.is_empty());
        assert!(queue.has_add_for("pending_abc"));

        queue.requeue_front(vec![popped]);
        assert_eq!(queue.len(), 1);

        queue.pop_front();
        queue.settle("pending_abc");
        assert!(!queue.has_add_for("pending_abc"));
    }

    #[test]
    fn test_same_target() {
        let update = PendingOperation::Update {
            collection: "notes".into(),
            id: "n1".into(),
            patch: Fields::new(),
        };
        assert!(update.same_target(&delete("n1")));
        assert!(!update.same_target(&delete("n2")));
    }

    #[test]
    fn test_resolve_ids() {
        let ids = HashMap::from([("pending_abc".to_string(), "srv1".to_string())]);

        let mut op = PendingOperation::Update {
            collection: "notes".into(),
            id: "pending_abc".into(),
            patch: Fields::new(),
        };
        op.resolve_ids(&ids);
        assert_eq!(op.document_id(), "srv1");
        assert_eq!(op.depends_on(), None);
    }

    #[test]
    fn test_queued_operation_serializes_tagged() {
        let queued = QueuedOperation::new(delete("n1"));
        let value = serde_json::to_value(&queued).unwrap();
        assert_eq!(value["type"], json!("delete"));
        assert_eq!(value["collection"], json!("notes"));
        assert_eq!(value["attempts"], json!(0));
    }
}
