//! Uniform image envelope for every provider path.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};
use tshirt_studio_core::DataUri;

use crate::providers::{ImageFetcher, ProviderError, ProviderImage};

const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Failure to turn a provider image into a data URI.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Downloading the provider's URL failed.
    #[error("Failed to fetch generated image: {0}")]
    Fetch(#[from] ProviderError),

    /// The provider's URL was itself a malformed data URI.
    #[error("Generated image is not a valid data URI: {0}")]
    InvalidDataUri(#[from] tshirt_studio_core::DataUriError),
}

/// Converts provider output into a base64 data URI.
///
/// Remote URLs are downloaded with the fetcher's timeout and embedded;
/// inline payloads pass through unchanged.
#[derive(Clone)]
pub struct ResponseNormalizer {
    fetcher: Arc<dyn ImageFetcher>,
}

impl std::fmt::Debug for ResponseNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseNormalizer").finish_non_exhaustive()
    }
}

impl ResponseNormalizer {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Produce a `data:image/...;base64,` URI for the image.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote image cannot be fetched.
    #[instrument(skip(self, image))]
    pub async fn to_data_uri(&self, image: ProviderImage) -> Result<DataUri, NormalizeError> {
        match image {
            ProviderImage::Inline(uri) => Ok(uri),
            ProviderImage::Url(url) if url.starts_with("data:") => Ok(DataUri::parse(&url)?),
            ProviderImage::Url(url) => {
                let fetched = self.fetcher.fetch(&url).await?;
                let mime = image_mime(fetched.content_type.as_deref());
                debug!(bytes = fetched.bytes.len(), mime, "Embedded remote image");
                Ok(DataUri::from_bytes(mime, &fetched.bytes))
            }
        }
    }
}

/// The MIME type to label fetched bytes with. Parameters are dropped and
/// anything other than `image/*` falls back to PNG.
fn image_mime(content_type: Option<&str>) -> &str {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|mime| mime.starts_with("image/") && mime.len() > "image/".len())
        .unwrap_or(DEFAULT_IMAGE_MIME)
}
