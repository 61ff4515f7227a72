//! Integration tests for creator collection management.
//!
//! A local router stands in for the Shopify Admin API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tshirt_studio_api::config::ApiConfig;
use tshirt_studio_api::state::AppState;
use tshirt_studio_integration_tests::{client, json_response, shopify_client, spawn, spawn_app};

#[derive(Clone)]
struct Admin {
    next_id: Arc<AtomicU64>,
    created: Arc<Mutex<Vec<Value>>>,
    tokens: Arc<Mutex<Vec<String>>>,
}

async fn create_collection(State(admin): State<Admin>, Json(body): Json<Value>) -> Json<Value> {
    let collection = body["custom_collection"].clone();
    let id = admin.next_id.fetch_add(1, Ordering::SeqCst);
    let title = collection["title"].as_str().unwrap_or_default().to_string();
    admin.created.lock().expect("poisoned").push(collection);
    Json(json!({
        "custom_collection": {
            "id": id,
            "title": title,
            "handle": title.to_lowercase().replace(' ', "-"),
        }
    }))
}

async fn get_collection(
    State(admin): State<Admin>,
    headers: HeaderMap,
    Path(file): Path<String>,
) -> Json<Value> {
    if let Some(token) = headers
        .get("x-shopify-access-token")
        .and_then(|v| v.to_str().ok())
    {
        admin.tokens.lock().expect("poisoned").push(token.to_string());
    }
    let id: u64 = file
        .trim_end_matches(".json")
        .parse()
        .expect("numeric collection id");
    Json(json!({
        "custom_collection": { "id": id, "title": "Acme - Original Designs", "handle": "acme" }
    }))
}

async fn setup() -> (String, Admin) {
    let admin = Admin {
        next_id: Arc::new(AtomicU64::new(1001)),
        created: Arc::default(),
        tokens: Arc::default(),
    };
    let shopify = spawn(
        Router::new()
            .route(
                "/admin/api/2024-10/custom_collections.json",
                post(create_collection),
            )
            .route(
                "/admin/api/2024-10/custom_collections/{file}",
                get(get_collection),
            )
            .with_state(admin.clone()),
    )
    .await;

    let state = AppState::builder(ApiConfig::default())
        .shopify(shopify_client(&shopify))
        .build();
    (spawn_app(state).await, admin)
}

#[tokio::test]
async fn test_create_collections_for_creator() {
    let (base, admin) = setup().await;

    let resp = client()
        .post(format!("{base}/api/shopify/collections"))
        .json(&json!({
            "creatorData": {
                "uid": "creator_9",
                "email": "maker@acme.test",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "businessName": "Acme",
            }
        }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 200, "body: {body}");
    assert_eq!(body["allSuccessful"], true);
    assert_eq!(body["creatorCollection"]["success"], true);
    assert_eq!(
        body["creatorCollection"]["collectionTitle"],
        "Acme - Original Designs"
    );
    assert_eq!(
        body["communityCollection"]["collectionTitle"],
        "Acme - Community Designs"
    );
    assert_ne!(
        body["creatorCollection"]["collectionId"],
        body["communityCollection"]["collectionId"]
    );

    let created = admin.created.lock().expect("poisoned");
    assert_eq!(created.len(), 2);
    let metafields = created[0]["metafields"].as_array().expect("metafields");
    assert!(
        metafields
            .iter()
            .any(|m| m["key"] == "creator_id" && m["value"] == "creator_9")
    );
}

#[tokio::test]
async fn test_create_collections_requires_creator_data() {
    let (base, admin) = setup().await;

    let resp = client()
        .post(format!("{base}/api/shopify/collections"))
        .json(&json!({}))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Missing creatorData");
    assert!(admin.created.lock().expect("poisoned").is_empty());
}

#[tokio::test]
async fn test_get_collection_uses_admin_token() {
    let (base, admin) = setup().await;

    let resp = client()
        .get(format!("{base}/api/shopify/collection/1001"))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 200, "body: {body}");
    assert_eq!(body["collection"]["id"], 1001);
    assert_eq!(
        *admin.tokens.lock().expect("poisoned"),
        vec!["shpat_test".to_string()]
    );
}

#[tokio::test]
async fn test_collection_id_must_be_numeric() {
    let (base, _admin) = setup().await;

    let resp = client()
        .get(format!("{base}/api/shopify/collection/abc"))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid collection ID");
}

#[tokio::test]
async fn test_collections_without_admin_token_report_both_failures() {
    let base = spawn_app(AppState::builder(ApiConfig::default()).build()).await;

    let resp = client()
        .post(format!("{base}/api/shopify/collections"))
        .json(&json!({ "creatorData": { "uid": "creator_9", "businessName": "Acme" } }))
        .send()
        .await
        .expect("request failed");
    let (status, body) = json_response(resp).await;

    assert_eq!(status, 500);
    assert_eq!(body["allSuccessful"], false);
    assert_eq!(body["creatorCollection"]["success"], false);
    assert_eq!(
        body["communityCollection"]["error"],
        "Admin API token not configured"
    );
}
