//! Data Migration
//!
//! Copies records kept in local collections (a JSON object of arrays) into the
//! document store, one add per record, and keeps a per-record log. Once a run
//! succeeds the migrated collections can be cleared from the local source.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::policy::Role;
use crate::service::{DocumentService, WriteStatus};

/// Local collection name to array of raw records.
pub type LocalCollections = HashMap<String, Vec<Value>>;

/// Field holding the record's local id once it has been migrated.
const LEGACY_ID_FIELD: &str = "legacyId";
const MIGRATED_AT_FIELD: &str = "migratedAt";

/// Reads local collections from a JSON file.
pub fn load_local_collections(path: impl AsRef<Path>) -> Result<LocalCollections> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SyncError::Internal(format!("cannot read {}: {}", path.display(), e)))?;
    parse_local_collections(&raw)
}

pub fn parse_local_collections(raw: &str) -> Result<LocalCollections> {
    serde_json::from_str(raw)
        .map_err(|e| SyncError::InvalidRequest(format!("malformed local collections: {}", e)))
}

/// Removes the migrated collections from a local collections file.
///
/// Keys that are not migrated are kept. A file left empty is deleted.
/// Returns how many collections were removed.
pub fn clear_local_source(path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SyncError::Internal(format!("cannot read {}: {}", path.display(), e)))?;
    let mut local: Map<String, Value> = serde_json::from_str(&raw)
        .map_err(|e| SyncError::InvalidRequest(format!("malformed local collections: {}", e)))?;

    let removed = RecordKind::ALL
        .iter()
        .filter(|kind| local.remove(kind.source()).is_some())
        .count();

    let written = if local.is_empty() {
        std::fs::remove_file(path)
    } else {
        let rest = serde_json::to_string_pretty(&local)
            .map_err(|e| SyncError::Internal(e.to_string()))?;
        std::fs::write(path, rest)
    };
    written.map_err(|e| SyncError::Internal(format!("cannot update {}: {}", path.display(), e)))?;

    info!(removed, path = %path.display(), "Local collections cleared");
    Ok(removed)
}

// == Record Kind ==
/// Kinds of local records, in migration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Video,
    Exam,
    Note,
    Material,
    Todo,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Video,
        RecordKind::Exam,
        RecordKind::Note,
        RecordKind::Material,
        RecordKind::Todo,
    ];

    /// Name of the local collection the records are read from.
    pub fn source(self) -> &'static str {
        match self {
            RecordKind::Video => "videos",
            RecordKind::Exam => "exams",
            RecordKind::Note => "notes",
            RecordKind::Material => "materials",
            RecordKind::Todo => "todos",
        }
    }

    /// Store collection the records are written to.
    pub fn target(self) -> &'static str {
        match self {
            RecordKind::Video => "lessons",
            other => other.source(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Video => "video",
            RecordKind::Exam => "exam",
            RecordKind::Note => "note",
            RecordKind::Material => "material",
            RecordKind::Todo => "todo",
        }
    }
}

// == Log ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Success,
    /// Held in the offline queue; lands on the next replay
    Queued,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationLogEntry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Local id of the record, if it had one
    pub id: Option<String>,
    pub status: MigrationStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// No record failed
    pub success: bool,
    pub migrated: usize,
    pub queued: usize,
    pub failed: usize,
    pub log: Vec<MigrationLogEntry>,
}

// == Data Migration ==
pub struct DataMigration {
    service: Arc<DocumentService>,
    log: Vec<MigrationLogEntry>,
}

impl DataMigration {
    pub fn new(service: Arc<DocumentService>) -> Self {
        Self {
            service,
            log: Vec::new(),
        }
    }

    /// Migrates every known kind. A failing record is logged and skipped.
    pub async fn migrate_all(&mut self, source: &LocalCollections) -> MigrationReport {
        info!("Starting data migration");
        let start = self.log.len();

        for kind in RecordKind::ALL {
            let records = source.get(kind.source()).map(Vec::as_slice).unwrap_or(&[]);
            self.migrate_kind(kind, records).await;
        }

        let run = &self.log[start..];
        let count = |status: MigrationStatus| run.iter().filter(|e| e.status == status).count();
        let report = MigrationReport {
            success: count(MigrationStatus::Failed) == 0,
            migrated: count(MigrationStatus::Success),
            queued: count(MigrationStatus::Queued),
            failed: count(MigrationStatus::Failed),
            log: run.to_vec(),
        };
        info!(
            migrated = report.migrated,
            queued = report.queued,
            failed = report.failed,
            "Data migration finished"
        );
        report
    }

    /// Migrates the records of one kind into its target collection.
    pub async fn migrate_kind(&mut self, kind: RecordKind, records: &[Value]) {
        if records.is_empty() {
            return;
        }
        info!(kind = kind.label(), count = records.len(), target = kind.target(), "Migrating records");

        for record in records {
            let local_id = record.get("id").and_then(id_to_string);
            let outcome = self.migrate_record(kind, record).await;

            let (status, error) = match outcome {
                Ok(WriteStatus::Committed) => (MigrationStatus::Success, None),
                Ok(WriteStatus::Queued) => (MigrationStatus::Queued, None),
                Err(err) => {
                    warn!(kind = kind.label(), id = ?local_id, error = %err, "Record migration failed");
                    (MigrationStatus::Failed, Some(err.to_string()))
                }
            };
            self.log.push(MigrationLogEntry {
                kind: kind.label(),
                id: local_id,
                status,
                error,
                timestamp: Utc::now(),
            });
        }
    }

    async fn migrate_record(&self, kind: RecordKind, record: &Value) -> Result<WriteStatus> {
        let mut fields = record
            .as_object()
            .cloned()
            .ok_or_else(|| SyncError::InvalidRequest("record is not a JSON object".to_string()))?;

        // The store assigns its own id
        if let Some(local_id) = fields.remove("id") {
            fields.insert(LEGACY_ID_FIELD.to_string(), local_id);
        }
        fields.insert(
            MIGRATED_AT_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let added = self
            .service
            .add_document(Role::Teacher, kind.target(), fields)
            .await?;
        Ok(added.status)
    }

    pub fn log(&self) -> &[MigrationLogEntry] {
        &self.log
    }

    /// The full log as pretty-printed JSON.
    pub fn export_log(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.log).map_err(|e| SyncError::Internal(e.to_string()))
    }
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;

    fn setup(connectivity: ConnectivityMonitor) -> (Arc<MemoryStore>, Arc<DocumentService>) {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(DocumentService::new(store.clone(), connectivity));
        (store, service)
    }

    fn source(value: Value) -> LocalCollections {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_record_kind_targets() {
        assert_eq!(RecordKind::Video.source(), "videos");
        assert_eq!(RecordKind::Video.target(), "lessons");
        assert_eq!(RecordKind::Todo.target(), "todos");
        assert_eq!(RecordKind::ALL[0], RecordKind::Video);
    }

    #[tokio::test]
    async fn test_migrate_all_maps_collections() {
        let (store, service) = setup(ConnectivityMonitor::online());
        let mut migration = DataMigration::new(service);

        let report = migration
            .migrate_all(&source(json!({
                "videos": [{"id": 1, "title": "Intro"}, {"id": 2, "title": "Loops"}],
                "todos": [{"id": "t1", "text": "Homework"}],
                "unknown": [{"id": "x"}]
            })))
            .await;

        assert!(report.success);
        assert_eq!(report.migrated, 3);
        assert_eq!(store.count("lessons").await, 2);
        assert_eq!(store.count("videos").await, 0);
        assert_eq!(store.count("todos").await, 1);
        assert_eq!(store.count("unknown").await, 0);

        let lessons = store.list("lessons").await.unwrap();
        let intro = lessons
            .iter()
            .find(|d| d.get("title") == Some(&json!("Intro")))
            .unwrap();
        assert_eq!(intro.get("legacyId"), Some(&json!(1)));
        assert!(intro.get("migratedAt").and_then(Value::as_str).is_some());

        assert_eq!(report.log[0].kind, "video");
        assert_eq!(report.log[0].id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_failed_record_does_not_abort() {
        let (store, service) = setup(ConnectivityMonitor::online());
        store.fail_next_writes(1);
        let mut migration = DataMigration::new(service);

        let report = migration
            .migrate_all(&source(json!({
                "exams": [{"id": "e1"}, {"id": "e2"}],
                "notes": ["not an object"]
            })))
            .await;

        assert!(!report.success);
        assert_eq!(report.failed, 2);
        assert_eq!(report.migrated, 1);
        assert_eq!(store.count("exams").await, 1);

        let failed: Vec<_> = report
            .log
            .iter()
            .filter(|e| e.status == MigrationStatus::Failed)
            .collect();
        assert_eq!(failed[0].id.as_deref(), Some("e1"));
        assert!(failed[0].error.is_some());
        assert_eq!(failed[1].kind, "note");
    }

    #[tokio::test]
    async fn test_offline_migration_is_queued() {
        let (store, service) = setup(ConnectivityMonitor::offline());
        let mut migration = DataMigration::new(service.clone());

        let report = migration
            .migrate_all(&source(json!({"materials": [{"id": "m1"}]})))
            .await;

        assert!(report.success);
        assert_eq!(report.queued, 1);
        assert_eq!(service.queue_len().await, 1);
        assert_eq!(store.count("materials").await, 0);
    }

    #[tokio::test]
    async fn test_export_log_is_pretty_json() {
        let (_store, service) = setup(ConnectivityMonitor::online());
        let mut migration = DataMigration::new(service);
        migration
            .migrate_all(&source(json!({"todos": [{"id": "t1"}]})))
            .await;

        let exported = migration.export_log().unwrap();
        assert!(exported.contains('\n'));
        let parsed: Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed[0]["type"], json!("todo"));
        assert_eq!(parsed[0]["status"], json!("success"));
        assert_eq!(migration.log().len(), 1);
    }

    fn temp_source(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "classroom_sync_{}.json",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_clear_local_source_after_migration() {
        let path = temp_source(r#"{"todos": [{"id": "t1"}], "exams": []}"#);
        let (store, service) = setup(ConnectivityMonitor::online());
        let mut migration = DataMigration::new(service);

        let report = migration
            .migrate_all(&load_local_collections(&path).unwrap())
            .await;
        assert!(report.success);
        assert_eq!(store.count("todos").await, 1);

        assert_eq!(clear_local_source(&path).unwrap(), 2);
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_local_source_keeps_other_keys() {
        let path = temp_source(r#"{"videos": [{"id": 1}], "settings": {"theme": "dark"}}"#);

        assert_eq!(clear_local_source(&path).unwrap(), 1);
        let rest: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rest, json!({"settings": {"theme": "dark"}}));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            clear_local_source(&path),
            Err(SyncError::Internal(_))
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_source() {
        assert!(parse_local_collections("{\"videos\": [{}]}").is_ok());
        let err = parse_local_collections("[1, 2]").unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)));
    }
}
