//! Document model shared by the store, the service and the change feed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map of a document (a JSON object without the id).
pub type Fields = Map<String, Value>;

/// Reserved key: a document's id lives beside its fields, never inside them.
pub const ID_FIELD: &str = "id";

/// Prefix carried by ids that were synthesized locally while offline.
pub const PLACEHOLDER_PREFIX: &str = "pending_";

/// Returns true for locally generated ids that the server has not confirmed yet.
pub fn is_placeholder_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

/// Generates a fresh placeholder id.
pub fn placeholder_id() -> String {
    format!("{}{}", PLACEHOLDER_PREFIX, uuid::Uuid::new_v4().simple())
}

// == Document ==
/// A stored document: its id plus a flat field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    /// Builds a document. An `id` key inside `fields` is discarded.
    pub fn new(id: impl Into<String>, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Returns a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn is_placeholder(&self) -> bool {
        is_placeholder_id(&self.id)
    }
}

// == Change Feed ==
/// Kind of change reported by a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single change delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

impl DocumentChange {
    pub fn new(kind: ChangeKind, document: Document) -> Self {
        Self { kind, document }
    }
}

/// What a change subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    Collection(String),
    Document { collection: String, id: String },
}

impl WatchTarget {
    pub fn collection(name: impl Into<String>) -> Self {
        Self::Collection(name.into())
    }

    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Document {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Registry key: `"<collection>"` or `"<collection>/<id>"`.
    pub fn key(&self) -> String {
        match self {
            Self::Collection(name) => name.clone(),
            Self::Document { collection, id } => format!("{}/{}", collection, id),
        }
    }

    pub fn collection_name(&self) -> &str {
        match self {
            Self::Collection(name) => name,
            Self::Document { collection, .. } => collection,
        }
    }

    /// Whether a change to `collection/id` is visible to this target.
    pub fn matches(&self, collection: &str, id: &str) -> bool {
        match self {
            Self::Collection(name) => name == collection,
            Self::Document {
                collection: c,
                id: d,
            } => c == collection && d == id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_document_serializes_flat() {
        let doc = Document::new("n1", fields(json!({"text": "x"})));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"id": "n1", "text": "x"}));
    }

    #[test]
    fn test_document_deserializes_flat() {
        let doc: Document = serde_json::from_value(json!({"id": "v1", "title": "Intro"})).unwrap();
        assert_eq!(doc.id, "v1");
        assert_eq!(doc.get("title"), Some(&json!("Intro")));
    }

    #[test]
    fn test_id_inside_fields_is_discarded() {
        let doc = Document::new("srv1", fields(json!({"id": "client", "t": 1})));
        assert_eq!(doc.get("id"), None);

        let raw = serde_json::to_string(&doc).unwrap();
        assert_eq!(raw.matches("\"id\"").count(), 1);
        let parsed: Document = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.id, "srv1");
    }

    #[test]
    fn test_placeholder_ids() {
        let id = placeholder_id();
        assert!(is_placeholder_id(&id));
        assert!(!is_placeholder_id("AbC123"));
        assert_ne!(id, placeholder_id());
    }

    #[test]
    fn test_watch_target_keys_and_matching() {
        let all = WatchTarget::collection("lessons");
        let one = WatchTarget::document("lessons", "1");

        assert_eq!(all.key(), "lessons");
        assert_eq!(one.key(), "lessons/1");
        assert!(all.matches("lessons", "2"));
        assert!(one.matches("lessons", "1"));
        assert!(!one.matches("lessons", "2"));
        assert!(!all.matches("exams", "1"));
    }
}
