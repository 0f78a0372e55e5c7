//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::config::Config;
use crate::coordinator::{
    HealthReport, ImportReport, MaintenanceReport, Snapshot, StorageCoordinator, StoreKind,
    StoreRef,
};
use crate::error::{Result, StorageError};
use crate::models::{
    validate_key, ClearResponse, DeleteResponse, EnqueueRequest, QueueResponse, SetResponse,
    SetValueRequest, StatsResponse, ValueResponse,
};
use crate::queue::PendingAction;
use crate::quota::UsageReport;
use crate::store::SetOptions;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<StorageCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<StorageCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Builds a coordinator over in-memory backends.
    pub fn in_memory(config: Config) -> Self {
        use crate::backend::MemoryBackend;

        let coordinator = StorageCoordinator::new(
            config,
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryBackend::new()),
        );
        Self::new(Arc::new(coordinator))
    }
}

/// Resolves the path segments of a per-key route.
fn key_target(kind: &str, key: &str) -> Result<StoreKind> {
    let kind: StoreKind = kind.parse()?;
    if kind == StoreKind::Queue {
        return Err(StorageError::InvalidRequest(
            "Queue entries are managed through /queue".to_string(),
        ));
    }
    if let Some(error_msg) = validate_key(key) {
        return Err(StorageError::InvalidRequest(error_msg));
    }
    Ok(kind)
}

/// Handler for GET /health
///
/// Responds 503 when any store fails its probe.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.coordinator.health_check();
    let status = if report.overall {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let coordinator = &state.coordinator;
    Ok(Json(StatsResponse {
        cache: coordinator.cache().stats()?,
        data_entries: coordinator.kv().list_keys()?.len(),
        session_entries: coordinator.session().list_keys()?.len(),
        queue_length: coordinator.queue().len()?,
    }))
}

/// Handler for GET /quota
pub async fn quota_handler(State(state): State<AppState>) -> Result<Json<UsageReport>> {
    Ok(Json(state.coordinator.quota().get_usage_report()?))
}

/// Handler for GET /queue
pub async fn list_queue_handler(State(state): State<AppState>) -> Result<Json<QueueResponse>> {
    let actions = state.coordinator.queue().dequeue_all()?;
    Ok(Json(QueueResponse::new(actions)))
}

/// Handler for POST /queue
pub async fn enqueue_handler(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<PendingAction>)> {
    if let Some(error_msg) = req.validate() {
        return Err(StorageError::InvalidRequest(error_msg));
    }

    let action = state.coordinator.queue().enqueue(req.into())?;
    Ok((StatusCode::CREATED, Json(action)))
}

/// Handler for DELETE /queue/:id
pub async fn dequeue_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.coordinator.queue().remove(&id)? {
        return Err(StorageError::NotFound(format!("Queued action '{}'", id)));
    }
    Ok(Json(DeleteResponse::new(id)))
}

/// Handler for POST /maintenance
pub async fn maintenance_handler(State(state): State<AppState>) -> Json<MaintenanceReport> {
    Json(state.coordinator.run_maintenance())
}

/// Handler for GET /export
pub async fn export_handler(State(state): State<AppState>) -> Result<Json<Snapshot>> {
    Ok(Json(state.coordinator.export_all()?))
}

/// Handler for POST /import
pub async fn import_handler(
    State(state): State<AppState>,
    Json(snapshot): Json<Snapshot>,
) -> Result<Json<ImportReport>> {
    Ok(Json(state.coordinator.import_all(&snapshot)?))
}

/// Handler for DELETE /data
pub async fn clear_data_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let removed = state.coordinator.clear_all_app_data()?;
    Ok(Json(ClearResponse::new(removed)))
}

/// Handler for GET /store/:kind/:key
pub async fn get_value_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
) -> Result<Json<ValueResponse>> {
    let kind = key_target(&kind, &key)?;

    let value = match state.coordinator.get_store(kind) {
        StoreRef::Data(store) => store.get::<Value>(&key)?,
        StoreRef::Cache(cache) => cache.get::<Value>(&key)?,
        StoreRef::Session(session) => session.get::<Value>(&key)?,
        StoreRef::Queue(_) => None,
    };

    match value {
        Some(value) => Ok(Json(ValueResponse::new(kind, key, value))),
        None => Err(StorageError::NotFound(format!("Key '{}' in {} store", key, kind))),
    }
}

/// Handler for PUT /store/:kind/:key
pub async fn put_value_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
    Json(req): Json<SetValueRequest>,
) -> Result<Json<SetResponse>> {
    let kind = key_target(&kind, &key)?;
    if let Some(error_msg) = req.validate(kind) {
        return Err(StorageError::InvalidRequest(error_msg));
    }
    let ttl = req.ttl.map(std::time::Duration::from_secs);

    match state.coordinator.get_store(kind) {
        StoreRef::Data(store) => {
            let options = SetOptions {
                ttl,
                ..SetOptions::default()
            };
            store.set(&key, &req.value, options)?
        }
        StoreRef::Cache(cache) => cache.set(&key, &req.value, ttl)?,
        StoreRef::Session(session) => session.set(&key, &req.value)?,
        StoreRef::Queue(_) => {}
    }

    Ok(Json(SetResponse::new(kind, key)))
}

/// Handler for DELETE /store/:kind/:key
pub async fn delete_value_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let kind = key_target(&kind, &key)?;

    match state.coordinator.get_store(kind) {
        StoreRef::Data(store) => store.remove(&key)?,
        StoreRef::Cache(cache) => cache.remove(&key)?,
        StoreRef::Session(session) => session.remove(&key)?,
        StoreRef::Queue(_) => {}
    }

    Ok(Json(DeleteResponse::new(key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::in_memory(Config::default())
    }

    fn path(kind: &str, key: &str) -> Path<(String, String)> {
        Path((kind.to_string(), key.to_string()))
    }

    #[tokio::test]
    async fn test_put_and_get_value() {
        let state = test_state();
        let req = SetValueRequest {
            value: json!({"theme": "dark"}),
            ttl: None,
        };

        put_value_handler(State(state.clone()), path("data", "prefs"), Json(req))
            .await
            .unwrap();

        let response = get_value_handler(State(state), path("data", "prefs"))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"theme": "dark"}));
    }

    #[tokio::test]
    async fn test_get_missing_value() {
        let result = get_value_handler(State(test_state()), path("cache", "nope")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_queue_kind_rejected_on_store_routes() {
        let result = get_value_handler(State(test_state()), path("queue", "pending")).await;
        assert!(matches!(result, Err(StorageError::InvalidRequest(_))));

        let result = get_value_handler(State(test_state()), path("blobs", "k")).await;
        assert!(matches!(result, Err(StorageError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_value() {
        let state = test_state();
        state.coordinator.session().set("draft", &"x").unwrap();

        delete_value_handler(State(state.clone()), path("session", "draft"))
            .await
            .unwrap();

        assert!(!state.coordinator.session().has("draft").unwrap());
    }

    #[tokio::test]
    async fn test_enqueue_and_dequeue() {
        let state = test_state();
        let req = EnqueueRequest {
            action_type: crate::queue::ActionType::Create,
            entity_kind: "recipe".to_string(),
            payload: json!({"title": "Soup"}),
        };

        let (status, Json(action)) = enqueue_handler(State(state.clone()), Json(req))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let listed = list_queue_handler(State(state.clone())).await.unwrap();
        assert_eq!(listed.count, 1);

        dequeue_handler(State(state.clone()), Path(action.id.clone()))
            .await
            .unwrap();
        let again = dequeue_handler(State(state), Path(action.id)).await;
        assert!(matches!(again, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (status, report) = health_handler(State(test_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(report.overall);
    }
}
