//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use storekeeper::{create_router, AppState, Config};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::in_memory(Config::default()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == Store Endpoint Tests ==

#[tokio::test]
async fn test_put_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/store/data/test_key",
            json!({"value": "test_value"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
    assert_eq!(json["store"], "data");
}

#[tokio::test]
async fn test_put_then_get_each_store() {
    let app = create_test_app();

    for kind in ["data", "cache", "session"] {
        let uri = format!("/store/{}/prefs", kind);
        let response = app
            .clone()
            .oneshot(json_request("PUT", &uri, json!({"value": {"theme": "dark"}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request("GET", &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["value"]["theme"], "dark");
        assert_eq!(json["store"], kind);
    }
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/store/cache/nonexistent"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_unknown_store_kind_is_bad_request() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/store/blobs/key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_ttl_is_rejected() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/store/session/draft",
            json!({"value": 1, "ttl": 60}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_zero_ttl_is_rejected() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/store/cache/short",
            json!({"value": 1, "ttl": 0}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_endpoint() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/store/data/gone", json!({"value": 1})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/store/data/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request("GET", "/store/data/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Queue Endpoint Tests ==

#[tokio::test]
async fn test_queue_lifecycle() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/queue",
            json!({"type": "create", "entityKind": "recipe", "payload": {"title": "Soup"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let action = body_to_json(response.into_body()).await;
    assert_eq!(action["attempts"], 0);
    let id = action["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/queue"))
        .await
        .unwrap();
    let listed = body_to_json(response.into_body()).await;
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["actions"][0]["id"], id.as_str());

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/queue/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request("DELETE", &format!("/queue/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_enqueue_requires_entity_kind() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/queue",
            json!({"type": "update", "entityKind": "  ", "payload": {}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == Stats / Quota / Health Tests ==

#[tokio::test]
async fn test_stats_track_hits_and_misses() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/store/cache/k", json!({"value": 1})))
        .await
        .unwrap();
    app.clone()
        .oneshot(empty_request("GET", "/store/cache/k"))
        .await
        .unwrap();
    app.clone()
        .oneshot(empty_request("GET", "/store/cache/missing"))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cache"]["hits"], 1);
    assert_eq!(json["cache"]["misses"], 1);
    assert_eq!(json["cache"]["totalEntries"], 1);
    assert_eq!(json["queueLength"], 0);
}

#[tokio::test]
async fn test_quota_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(empty_request("GET", "/quota")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["quota"]["percentageUsed"].as_f64().unwrap() < 80.0);
    assert_eq!(json["recommendations"][0], "Storage usage is healthy.");
}

#[tokio::test]
async fn test_health_endpoint_reports_every_store() {
    let app = create_test_app();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["overall"], true);
    for kind in ["data", "cache", "queue", "session"] {
        assert_eq!(json["stores"][kind], true);
    }
}

// == Maintenance / Export / Import / Clear Tests ==

#[tokio::test]
async fn test_maintenance_endpoint() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("POST", "/maintenance"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["expiredData"], 0);
    assert!(json["quota"].is_object());
}

#[tokio::test]
async fn test_export_import_between_instances() {
    let source = create_test_app();
    source
        .clone()
        .oneshot(json_request("PUT", "/store/data/prefs", json!({"value": "dark"})))
        .await
        .unwrap();

    let response = source
        .oneshot(empty_request("GET", "/export"))
        .await
        .unwrap();
    let snapshot = body_to_json(response.into_body()).await;
    assert_eq!(snapshot["version"], 1);

    let target = create_test_app();
    let response = target
        .clone()
        .oneshot(json_request("POST", "/import", snapshot))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_to_json(response.into_body()).await;
    assert_eq!(report["imported"], 1);

    let response = target
        .oneshot(empty_request("GET", "/store/data/prefs"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "dark");
}

#[tokio::test]
async fn test_import_wrong_version_is_bad_request() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/import",
            json!({"timestamp": "2024-01-01T00:00:00.000Z", "version": 9}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_data_endpoint() {
    let app = create_test_app();

    for uri in ["/store/data/a", "/store/cache/b", "/store/session/c"] {
        app.clone()
            .oneshot(json_request("PUT", uri, json!({"value": 1})))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 3);

    let response = app.oneshot(empty_request("GET", "/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["dataEntries"], 0);
    assert_eq!(json["sessionEntries"], 0);
}
