//! Design storage on Vercel Blob.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::BlobConfig;

/// Blob API version sent with every request.
const API_VERSION: &str = "7";

/// Errors that can occur when storing a blob.
#[derive(Debug, Error)]
pub enum BlobError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredBlob {
    /// Public URL of the blob.
    pub url: String,
    pub pathname: String,
}

/// Object storage for finished designs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `pathname`, replacing any existing object.
    async fn put(
        &self,
        pathname: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob, BlobError>;
}

/// Vercel Blob REST client.
#[derive(Clone)]
pub struct VercelBlobClient {
    client: reqwest::Client,
    api_url: String,
}

impl std::fmt::Debug for VercelBlobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VercelBlobClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl VercelBlobClient {
    /// Create a new Blob client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &BlobConfig) -> Result<Self, BlobError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| BlobError::Config(format!("Invalid token format: {e}")))?,
        );
        headers.insert("x-api-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for VercelBlobClient {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(
        &self,
        pathname: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob, BlobError> {
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|e| BlobError::Config(format!("Invalid content type: {e}")))?;

        let response = self
            .client
            .put(format!("{}/{pathname}", self.api_url))
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BlobError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let blob: StoredBlob = response.json().await?;
        info!(url = %blob.url, "Stored design blob");
        Ok(blob)
    }
}
