//! Shopify OAuth and order webhook routes.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::error::{ApiJson, AppError, Result, add_breadcrumb, success};
use crate::shopify::{WebhookOrder, build_printify_order, verify_webhook_hmac};
use crate::state::AppState;

/// Header carrying the base64 HMAC-SHA256 of the raw webhook body.
pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
/// Header naming the webhook topic.
pub const TOPIC_HEADER: &str = "x-shopify-topic";
const ORDERS_CREATE: &str = "orders/create";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// `POST /api/shopify/token`: exchange an OAuth authorization code.
#[instrument(skip(state, body), fields(redirect_uri = ?body.redirect_uri))]
pub async fn exchange_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TokenRequest>,
) -> Result<Json<Value>> {
    let code = body
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let shopify = state
        .shopify()
        .filter(|s| s.has_oauth_credentials())
        .ok_or_else(|| AppError::NotConfigured("Shopify configuration missing".to_string()))?;

    let token = shopify
        .exchange_code(&code)
        .await
        .map_err(|e| AppError::failed("Failed to exchange authorization code", e))?;

    info!(scope = %token.scope, "Exchanged OAuth code");
    Ok(Json(json!({
        "access_token": token.access_token,
        "scope": token.scope,
    })))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /api/shopify/orders-webhook`: forward paid designs to Printify.
///
/// The signature is checked against the raw body bytes, so the body is
/// taken as [`Bytes`] and parsed only after verification.
#[instrument(skip_all, fields(topic))]
pub async fn orders_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let secret = state
        .config()
        .webhook
        .secret
        .as_ref()
        .ok_or_else(|| AppError::NotConfigured("Webhook secret not configured".to_string()))?;

    let signature = header_str(&headers, HMAC_HEADER).unwrap_or_default();
    if !verify_webhook_hmac(secret, &body, signature) {
        warn!("Rejected webhook with invalid HMAC");
        return Err(AppError::Unauthorized("Invalid HMAC".to_string()));
    }

    let topic = header_str(&headers, TOPIC_HEADER).unwrap_or_default();
    tracing::Span::current().record("topic", topic);
    if topic != ORDERS_CREATE {
        info!("Ignoring webhook topic");
        return Ok(success(json!({
            "message": "Ignored topic",
            "topic": topic,
        })));
    }

    let printify = state
        .printify()
        .ok_or_else(|| AppError::NotConfigured("Printify credentials not configured".to_string()))?;

    let order: WebhookOrder = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid order payload: {e}")))?;
    add_breadcrumb("webhook", "Verified orders/create webhook");

    let Some(new_order) = build_printify_order(&order, &state.config().webhook.variant_map) else {
        info!(order = ?order.name, "No eligible items with design URL");
        return Ok(success(json!({
            "message": "No eligible items with design URL",
        })));
    };

    let printify_order = printify
        .create_order(&new_order)
        .await
        .map_err(|e| AppError::printify("Failed to create Printify order", e))?;

    info!(
        external_id = %new_order.external_id,
        items = new_order.line_items.len(),
        "Forwarded order to Printify"
    );
    Ok(success(json!({ "printifyOrder": printify_order })))
}
