//! `orders/create` webhook handling.
//!
//! Shopify signs the raw body with HMAC-SHA256 and sends the base64 digest in
//! `X-Shopify-Hmac-Sha256`. Verified orders are mapped to a Printify order
//! holding one front print per line item that carries a design URL.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use super::types::{WebhookAddress, WebhookLineItem, WebhookOrder, scalar_string};
use crate::printify::{NewOrder, OrderLineItem, ShippingAddress};

/// Line item property names that carry the design image URL.
const DESIGN_PROPERTIES: &[&str] = &["Design_URL", "_Design_Image"];

/// Verify a webhook signature against the raw request body.
///
/// Comparison is constant time. A header that is not valid base64 fails.
#[must_use]
pub fn verify_webhook_hmac(secret: &SecretString, body: &[u8], header: &str) -> bool {
    let Ok(signature) = STANDARD.decode(header.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Base64 HMAC-SHA256 of `body`, as Shopify would send it.
#[must_use]
pub fn sign_webhook_body(secret: &SecretString, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
    mac.update(body);
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Design URL from a line item's properties.
fn design_url(properties: &[Value]) -> Option<String> {
    properties.iter().find_map(|prop| {
        let (name, value) = match prop {
            Value::Object(map) => (
                map.get("name").or_else(|| map.get("key"))?.as_str()?,
                map.get("value")?,
            ),
            Value::Array(pair) => (pair.first()?.as_str()?, pair.get(1)?),
            _ => return None,
        };
        if !DESIGN_PROPERTIES.contains(&name) {
            return None;
        }
        value.as_str().filter(|v| !v.is_empty()).map(String::from)
    })
}

fn line_item(item: &WebhookLineItem, variant_map: &BTreeMap<String, u64>) -> Option<OrderLineItem> {
    let Some(url) = design_url(&item.properties) else {
        debug!("Skipping line item without design URL");
        return None;
    };
    let shopify_variant = item.variant_id.as_ref().and_then(scalar_string);
    let Some(variant_id) = shopify_variant
        .as_ref()
        .and_then(|v| variant_map.get(v))
        .copied()
    else {
        warn!(
            shopify_variant = ?shopify_variant,
            "Skipping line item with unmapped variant"
        );
        return None;
    };

    Some(OrderLineItem::front_print(
        variant_id,
        item.quantity.filter(|q| *q > 0).unwrap_or(1),
        url,
    ))
}

fn pick(
    shipping: Option<&WebhookAddress>,
    billing: Option<&WebhookAddress>,
    field: fn(&WebhookAddress) -> Option<&String>,
) -> Option<String> {
    shipping
        .and_then(field)
        .or_else(|| billing.and_then(field))
        .filter(|s| !s.is_empty())
        .cloned()
}

fn shipping_address(order: &WebhookOrder) -> ShippingAddress {
    let shipping = order.shipping_address.as_ref();
    let billing = order.billing_address.as_ref();
    let ship = |field: fn(&WebhookAddress) -> Option<&String>| {
        shipping.and_then(field).cloned().unwrap_or_default()
    };

    ShippingAddress {
        first_name: pick(shipping, billing, |a| a.first_name.as_ref())
            .unwrap_or_else(|| "Customer".to_string()),
        last_name: pick(shipping, billing, |a| a.last_name.as_ref())
            .unwrap_or_else(|| "Unknown".to_string()),
        email: order
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "unknown@example.com".to_string()),
        phone: order.phone.clone().unwrap_or_default(),
        country: shipping
            .and_then(|a| a.country_code.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "US".to_string()),
        region: ship(|a| a.province.as_ref()),
        address1: ship(|a| a.address1.as_ref()),
        address2: ship(|a| a.address2.as_ref()),
        city: ship(|a| a.city.as_ref()),
        zip: ship(|a| a.zip.as_ref()),
    }
}

/// Map a Shopify order to a Printify order.
///
/// Returns `None` when no line item has both a design URL and a mapped
/// variant.
#[must_use]
pub fn build_printify_order(
    order: &WebhookOrder,
    variant_map: &BTreeMap<String, u64>,
) -> Option<NewOrder> {
    let line_items: Vec<_> = order
        .line_items
        .iter()
        .filter_map(|item| line_item(item, variant_map))
        .collect();
    if line_items.is_empty() {
        return None;
    }

    let id = scalar_string(&order.id).unwrap_or_default();
    Some(NewOrder {
        external_id: format!("shopify-{id}"),
        label: format!("Shopify order {}", order.name.as_deref().unwrap_or_default()),
        line_items,
        send_to_production: false,
        shipping_method: 1,
        address_to: shipping_address(order),
    })
}
