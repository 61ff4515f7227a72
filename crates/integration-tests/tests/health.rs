//! Integration tests for service health and routing fallbacks.

use std::sync::Arc;

use tshirt_studio_api::config::ApiConfig;
use tshirt_studio_api::services::UsageMeter;
use tshirt_studio_api::state::AppState;
use tshirt_studio_integration_tests::{MemoryUsageStore, client, json_response, spawn_app};

#[tokio::test]
async fn test_health_lists_endpoints() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;

    let (status, body) = json_response(
        client()
            .get(format!("{base}/health"))
            .send()
            .await
            .expect("request failed"),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
    let endpoints = body["endpoints"].as_array().expect("endpoints");
    assert!(endpoints.iter().any(|e| e == "/api/generate-sd"));
}

#[tokio::test]
async fn test_readiness_with_and_without_usage_store() {
    let http = client();

    let bare = spawn_app(AppState::builder(ApiConfig::default()).build()).await;
    let resp = http
        .get(format!("{bare}/health/ready"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status().as_u16(), 200);

    let metered = spawn_app(
        AppState::builder(ApiConfig::default())
            .usage(Some(UsageMeter::new(Arc::new(MemoryUsageStore::default()))))
            .build(),
    )
    .await;
    let resp = http
        .get(format!("{metered}/health/ready"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn test_index_describes_service() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;

    let (status, body) = json_response(
        client()
            .get(format!("{base}/"))
            .send()
            .await
            .expect("request failed"),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "Running");
}

#[tokio::test]
async fn test_unknown_path_returns_json_404() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;

    let (status, body) = json_response(
        client()
            .get(format!("{base}/api/nope"))
            .send()
            .await
            .expect("request failed"),
    )
    .await;

    assert_eq!(status, 404);
    assert_eq!(body["error"], "Endpoint not found");
    assert_eq!(body["path"], "/api/nope");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;

    let (status, body) = json_response(
        client()
            .post(format!("{base}/api/generate"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .expect("request failed"),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;

    let resp = client()
        .get(format!("{base}/health"))
        .header("x-request-id", "req-7f3a")
        .send()
        .await
        .expect("request failed");

    assert_eq!(
        resp.headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-7f3a")
    );
}
