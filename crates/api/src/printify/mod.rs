//! Printify print-on-demand client.
//!
//! Thin REST wrapper for image uploads, products, publishing to the connected
//! Shopify store, and orders. Catalog variants are cached with `moka` for an
//! hour since they change rarely and every product editor load needs them.

mod client;
pub mod types;

pub use client::{PrintifyClient, VariantCatalog};
pub use types::*;

use thiserror::Error;

/// Errors that can occur when interacting with Printify.
#[derive(Debug, Error)]
pub enum PrintifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Client configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
