//! Shopify Admin API, OAuth and webhook support.
//!
//! # APIs
//!
//! ## Admin REST API
//! - Creator collections tagged with `creator` namespace metafields
//! - Product images, metafields and collection membership after publishing
//!
//! ## OAuth
//! - Authorization code exchange for app installs
//!
//! ## Webhooks
//! - `orders/create` signature verification and mapping to Printify orders

mod client;
pub mod types;
pub mod webhook;

pub use client::{CreatorCollections, ShopifyClient};
pub use types::*;
pub use webhook::{build_printify_order, sign_webhook_body, verify_webhook_hmac};

use thiserror::Error;

/// Errors that can occur when interacting with Shopify.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No Admin API token is configured.
    #[error("Admin API token not configured")]
    MissingAdminToken,

    /// Client configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
