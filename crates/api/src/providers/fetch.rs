//! Remote image download.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::instrument;

use super::{FetchedImage, ImageFetcher, ProviderError, ProviderErrorKind, error_from_response};

const PROVIDER: &str = "image-fetch";

/// Fetches images over HTTP with a fixed timeout.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ProviderError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::InvalidInput,
                format!("unsupported image URL: {url}"),
            ));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(
                error_from_response(PROVIDER, response, |status, _| {
                    ProviderErrorKind::from_status(status)
                })
                .await,
            );
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?
            .to_vec();

        if bytes.is_empty() {
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::EmptyResponse,
                "image body was empty",
            ));
        }

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}
