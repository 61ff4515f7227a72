use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

/// Public endpoints listed by the health and index routes.
pub const ENDPOINTS: [&str; 7] = [
    "/api/generate",
    "/api/generate-sd",
    "/api/upload-design",
    "/api/get-design",
    "/api/extract-sprite",
    "/api/shopify",
    "/api/printify",
];

/// Liveness check. Does not touch dependencies.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "endpoints": ENDPOINTS,
    }))
}

/// Readiness check.
///
/// Returns 503 Service Unavailable if the usage store is configured and
/// cannot be reached.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(usage) = state.usage() else {
        return StatusCode::OK;
    };
    match usage.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Usage store unreachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "T-Shirt Studio API",
        "status": "Running",
        "endpoints": {
            "health": "/health",
            "generateDesign": "POST /api/generate",
            "generateImage": "POST /api/generate-sd",
            "uploadDesign": "POST /api/upload-design",
            "extractSprite": "POST /api/extract-sprite",
            "shopifyCollections": "POST /api/shopify/collections",
            "shopifyWebhook": "POST /api/shopify/orders-webhook",
            "printifyUpload": "POST /api/printify/upload-image",
        },
    }))
}
