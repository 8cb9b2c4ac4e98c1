//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint. Every handler goes
//! through the shared [`DocumentService`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::config::Config;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::error::{Result, SyncError};
use crate::models::{
    ClearCacheResponse, CollectionQuery, ConnectivityRequest, ConnectivityResponse, Document,
    Fields, HealthResponse, QueueResponse, StatsResponse, WriteResponse,
};
use crate::policy::Role;
use crate::service::{Added, DocumentService, ReplayReport, WriteStatus};
use crate::store::SharedStore;

/// Header carrying the caller's role. Absent means student.
pub const ROLE_HEADER: &str = "x-role";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
}

impl AppState {
    pub fn new(service: Arc<DocumentService>) -> Self {
        Self { service }
    }

    /// Creates a new AppState from configuration.
    ///
    /// The connectivity signal starts in the state given by `start_online`.
    pub fn from_config(store: SharedStore, config: &Config) -> Self {
        let connectivity = if config.start_online {
            ConnectivityMonitor::online()
        } else {
            ConnectivityMonitor::offline()
        };
        Self::new(Arc::new(DocumentService::from_config(
            store,
            connectivity,
            config,
        )))
    }
}

fn role_from_headers(headers: &HeaderMap) -> Result<Role> {
    match headers.get(ROLE_HEADER) {
        None => Ok(Role::Student),
        Some(value) => value
            .to_str()
            .map_err(|_| SyncError::InvalidRequest(format!("{} header is not valid text", ROLE_HEADER)))?
            .parse(),
    }
}

fn write_status_code(status: WriteStatus, committed: StatusCode) -> StatusCode {
    match status {
        WriteStatus::Committed => committed,
        WriteStatus::Queued => StatusCode::ACCEPTED,
    }
}

// == Reads ==

/// Handler for GET /collections/:collection
///
/// `?fresh=true` bypasses the cache.
pub async fn list_collection_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> Result<Json<Vec<Document>>> {
    let docs = state
        .service
        .get_collection(&collection, !query.fresh)
        .await?;
    Ok(Json(docs))
}

/// Handler for GET /collections/:collection/:id
pub async fn get_document_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>> {
    state
        .service
        .get_document(&collection, &id)
        .await?
        .map(Json)
        .ok_or_else(|| SyncError::NotFound(format!("{}/{}", collection, id)))
}

// == Writes ==

/// Handler for POST /collections/:collection
///
/// Responds 201 when stored remotely, 202 when queued offline.
pub async fn add_document_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(collection): Path<String>,
    Json(payload): Json<Fields>,
) -> Result<(StatusCode, Json<Added>)> {
    let role = role_from_headers(&headers)?;
    let added = state
        .service
        .add_document(role, &collection, payload)
        .await?;
    Ok((write_status_code(added.status, StatusCode::CREATED), Json(added)))
}

/// Handler for PATCH /collections/:collection/:id
pub async fn update_document_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Fields>,
) -> Result<(StatusCode, Json<WriteResponse>)> {
    let role = role_from_headers(&headers)?;
    let status = state
        .service
        .update_document(role, &collection, &id, patch)
        .await?;
    Ok((
        write_status_code(status, StatusCode::OK),
        Json(WriteResponse::new(collection, id, status)),
    ))
}

/// Handler for DELETE /collections/:collection/:id
pub async fn delete_document_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<WriteResponse>)> {
    let role = role_from_headers(&headers)?;
    let status = state
        .service
        .delete_document(role, &collection, &id)
        .await?;
    Ok((
        write_status_code(status, StatusCode::OK),
        Json(WriteResponse::new(collection, id, status)),
    ))
}

// == Offline Queue ==

/// Handler for GET /queue
pub async fn queue_handler(State(state): State<AppState>) -> Json<QueueResponse> {
    Json(QueueResponse::new(state.service.pending_operations().await))
}

/// Handler for POST /sync
pub async fn sync_handler(State(state): State<AppState>) -> Result<Json<ReplayReport>> {
    if !state.service.connectivity().is_online() {
        return Err(SyncError::InvalidRequest(
            "cannot replay the offline queue while offline".to_string(),
        ));
    }
    Ok(Json(state.service.sync_offline_queue().await))
}

/// Handler for PUT /connectivity
pub async fn connectivity_handler(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> Json<ConnectivityResponse> {
    let target = if req.online {
        Connectivity::Online
    } else {
        Connectivity::Offline
    };
    let changed = state.service.connectivity().set(target);
    Json(ConnectivityResponse {
        connectivity: state.service.connectivity().current(),
        changed,
    })
}

// == Cache & Status ==

/// Handler for DELETE /cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    state.service.clear_cache().await;
    Json(ClearCacheResponse::cleared())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let service = &state.service;
    Json(StatsResponse::new(
        service.cache_stats().await,
        service.queue_len().await,
        service.connectivity().current(),
        service.replay_failures().await.len(),
    ))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.service.connectivity().current()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn test_state(store: Arc<MemoryStore>, online: bool) -> AppState {
        let config = Config {
            start_online: online,
            ..Config::default()
        };
        AppState::from_config(store, &config)
    }

    fn teacher() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("teacher"));
        headers
    }

    #[test]
    fn test_role_defaults_to_student() {
        assert_eq!(role_from_headers(&HeaderMap::new()).unwrap(), Role::Student);
        assert_eq!(role_from_headers(&teacher()).unwrap(), Role::Teacher);

        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("admin"));
        assert!(matches!(
            role_from_headers(&headers),
            Err(SyncError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_add_and_get_handler() {
        let state = test_state(Arc::new(MemoryStore::new()), true);

        let (status, Json(added)) = add_document_handler(
            State(state.clone()),
            teacher(),
            Path("lessons".to_string()),
            Json(fields(json!({"title": "Intro"}))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(doc) = get_document_handler(
            State(state),
            Path(("lessons".to_string(), added.document.id.clone())),
        )
        .await
        .unwrap();
        assert_eq!(doc.get("title"), Some(&json!("Intro")));
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let state = test_state(Arc::new(MemoryStore::new()), true);
        let result = get_document_handler(
            State(state),
            Path(("lessons".to_string(), "nope".to_string())),
        )
        .await;
        assert!(matches!(result, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_student_cannot_write_lessons() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(store.clone(), true);

        let result = add_document_handler(
            State(state),
            HeaderMap::new(),
            Path("lessons".to_string()),
            Json(fields(json!({"title": "Intro"}))),
        )
        .await;
        assert!(matches!(result, Err(SyncError::Forbidden(_))));
        assert_eq!(store.count("lessons").await, 0);
    }

    #[tokio::test]
    async fn test_offline_delete_is_accepted() {
        let state = test_state(Arc::new(MemoryStore::new()), false);

        let (status, Json(resp)) = delete_document_handler(
            State(state.clone()),
            HeaderMap::new(),
            Path(("todos".to_string(), "t1".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(resp.status, WriteStatus::Queued);

        let Json(queue) = queue_handler(State(state)).await;
        assert_eq!(queue.len, 1);
    }

    #[tokio::test]
    async fn test_sync_refused_while_offline() {
        let state = test_state(Arc::new(MemoryStore::new()), false);
        assert!(sync_handler(State(state)).await.is_err());
    }

    #[tokio::test]
    async fn test_connectivity_handler() {
        let state = test_state(Arc::new(MemoryStore::new()), true);

        let Json(resp) = connectivity_handler(
            State(state.clone()),
            Json(ConnectivityRequest { online: false }),
        )
        .await;
        assert!(resp.changed);
        assert_eq!(resp.connectivity, Connectivity::Offline);

        let Json(health) = health_handler(State(state)).await;
        assert_eq!(health.connectivity, Connectivity::Offline);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state(Arc::new(MemoryStore::new()), true);
        let Json(stats) = stats_handler(State(state)).await;
        assert_eq!(stats.cache.total_entries, 0);
        assert_eq!(stats.queue_len, 0);
    }
}
