//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                      - Service index
//! GET  /health                                - Liveness
//! GET  /health/ready                          - Readiness (usage store)
//!
//! # Generation
//! POST /api/generate                          - Quick DALL-E 3 design
//! POST /api/generate-sd                       - Print-ready design with references
//! POST /api/extract-sprite                    - Cut an element out of an image
//!
//! # Designs
//! POST /api/upload-design                     - Store a finished design
//! GET  /api/get-design?id=                    - Browser storage hint
//!
//! # Shopify
//! POST /api/shopify/token                     - OAuth code exchange
//! POST /api/shopify/orders-webhook            - orders/create -> Printify order
//! POST /api/shopify/test-token                - Validate an Admin API token
//! POST /api/shopify/collections               - Create a creator's collections
//! GET  /api/shopify/creator-products/{id}     - Products in a creator's collections
//! GET|PUT|DELETE /api/shopify/collection/{id} - Collection CRUD
//!
//! # Printify
//! POST /api/printify/upload-image             - Upload to the media library
//! POST /api/printify/create-product           - Create a t-shirt product
//! POST /api/printify/publish-to-shopify       - Publish and decorate in Shopify
//! POST /api/printify/link-to-shopify          - Link for fulfillment only
//! GET  /api/printify/product/{id}             - Product with mockups
//! GET  /api/printify/variants                 - Cached catalog variants
//! POST /api/printify/variants/clear-cache     - Drop the variant cache
//! ```

pub mod collections;
pub mod designs;
pub mod generate;
pub mod health;
pub mod printify;
pub mod shopify;
pub mod sprites;

use std::time::Duration;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{Method, StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{generation_rate_limiter, proxy_rate_limiter, request_id_middleware};
use crate::state::AppState;

pub fn generation_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate::generate_design))
        .route("/generate-sd", post(generate::generate_image))
        .route("/extract-sprite", post(sprites::extract_sprite))
}

pub fn design_routes() -> Router<AppState> {
    Router::new()
        .route("/upload-design", post(designs::upload_design))
        .route("/get-design", get(designs::get_design))
}

pub fn shopify_routes() -> Router<AppState> {
    Router::new()
        .route("/token", post(shopify::exchange_token))
        .route("/test-token", post(collections::test_token))
        .route("/collections", post(collections::create_collections))
        .route(
            "/creator-products/{creator_id}",
            get(collections::creator_products),
        )
        .route(
            "/collection/{id}",
            get(collections::get_collection)
                .put(collections::update_collection)
                .delete(collections::delete_collection),
        )
}

pub fn printify_routes() -> Router<AppState> {
    Router::new()
        .route("/upload-image", post(printify::upload_image))
        .route("/create-product", post(printify::create_product))
        .route("/publish-to-shopify", post(printify::publish_to_shopify))
        .route("/link-to-shopify", post(printify::link_to_shopify))
        .route("/product/{id}", get(printify::get_product))
        .route("/variants", get(printify::variants))
        .route("/variants/clear-cache", post(printify::clear_variant_cache))
}

/// Webhooks are signed by Shopify and never rate limited.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/shopify/orders-webhook", post(shopify::orders_webhook))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "path": uri.path(),
        })),
    )
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86_400))
}

fn build(state: AppState, rate_limited: bool) -> Router {
    let (mut generation, mut proxies) = (
        generation_routes(),
        design_routes()
            .nest("/shopify", shopify_routes())
            .nest("/printify", printify_routes()),
    );
    if rate_limited {
        generation = generation.layer(generation_rate_limiter());
        proxies = proxies.layer(proxy_rate_limiter());
    }

    let body_limit = state.config().max_body_bytes;

    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", generation.merge(proxies).merge(webhook_routes()))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                        request_id = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .layer(cors_layer())
        .with_state(state)
}

/// The full application router without rate limiting.
///
/// Used by tests, which have no peer address for the limiter to key on.
pub fn router(state: AppState) -> Router {
    build(state, false)
}

/// The application router with per-IP rate limits on generation and
/// proxy routes. Must be served with connect info.
pub fn rate_limited_router(state: AppState) -> Router {
    build(state, true)
}
