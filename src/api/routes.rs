//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_data_handler, delete_value_handler, dequeue_handler, enqueue_handler, export_handler,
    get_value_handler, health_handler, import_handler, list_queue_handler, maintenance_handler,
    put_value_handler, quota_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Probe every store
/// - `GET /stats` - Cache statistics and entry counts
/// - `GET /quota` - Quota figures, breakdown, and recommendations
/// - `GET /queue`, `POST /queue`, `DELETE /queue/:id` - Offline queue
/// - `POST /maintenance` - Run one maintenance pass now
/// - `GET /export`, `POST /import` - Snapshot of every store
/// - `DELETE /data` - Remove all application data
/// - `GET|PUT|DELETE /store/:kind/:key` - Single values in the data, cache, or session store
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/quota", get(quota_handler))
        .route("/queue", get(list_queue_handler).post(enqueue_handler))
        .route("/queue/:id", delete(dequeue_handler))
        .route("/maintenance", post(maintenance_handler))
        .route("/export", get(export_handler))
        .route("/import", post(import_handler))
        .route("/data", delete(clear_data_handler))
        .route(
            "/store/:kind/:key",
            get(get_value_handler)
                .put(put_value_handler)
                .delete(delete_value_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::util::ServiceExt;

    async fn status_of(method: Method, uri: &str, body: Option<&str>) -> StatusCode {
        let app = create_router(AppState::in_memory(Config::default()));
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_read_only_endpoints_respond() {
        for uri in ["/health", "/stats", "/quota", "/queue", "/export"] {
            assert_eq!(status_of(Method::GET, uri, None).await, StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_put_endpoint() {
        let status = status_of(Method::PUT, "/store/cache/test", Some(r#"{"value":"hello"}"#)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let status = status_of(Method::GET, "/store/data/nonexistent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let status = status_of(Method::GET, "/get/legacy", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let status = status_of(Method::POST, "/health", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
