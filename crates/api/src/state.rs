//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::config::ApiConfig;
use crate::db::PgUsageStore;
use crate::generation::{GeneratorStrategy, ResponseNormalizer};
use crate::printify::{PrintifyClient, PrintifyError};
use crate::providers::{
    FetchedImage, GeminiClient, HttpImageFetcher, ImageFetcher, OpenAiClient, ProviderError,
    ProviderErrorKind, ReplicateClient, TextToImage,
};
use crate::services::{BlobError, BlobStore, SpriteExtractor, UsageMeter, VercelBlobClient};
use crate::shopify::{ShopifyClient, ShopifyError};

/// Error building the application state from configuration.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("provider client: {0}")]
    Provider(#[from] ProviderError),
    #[error("shopify client: {0}")]
    Shopify(#[from] ShopifyError),
    #[error("printify client: {0}")]
    Printify(#[from] PrintifyError),
    #[error("blob client: {0}")]
    Blob(#[from] BlobError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Every vendor client is optional; handlers
/// answer with a configuration error when theirs is absent.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    generator: GeneratorStrategy,
    designer: Option<Arc<dyn TextToImage>>,
    usage: Option<UsageMeter>,
    blob: Option<Arc<dyn BlobStore>>,
    shopify: Option<ShopifyClient>,
    printify: Option<PrintifyClient>,
    sprites: Option<SpriteExtractor>,
}

impl AppState {
    /// Build the state with production clients for every configured vendor.
    ///
    /// Usage metering is enabled when `pool` is given.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured client cannot be constructed.
    pub fn from_config(config: ApiConfig, pool: Option<PgPool>) -> Result<Self, StateError> {
        let timeout = config.upstream_timeout;
        let fetcher: Arc<dyn ImageFetcher> =
            Arc::new(HttpImageFetcher::new(config.image_fetch_timeout)?);
        let mut generator = GeneratorStrategy::new(ResponseNormalizer::new(fetcher));
        let mut designer: Option<Arc<dyn TextToImage>> = None;

        if let Some(openai) = &config.openai {
            let client = Arc::new(OpenAiClient::new(openai, timeout)?);
            generator = generator.with_vision_fallback(client.clone(), client.clone());
            designer = Some(client);
        }
        if let Some(gemini) = &config.gemini {
            generator = generator.with_editor(Arc::new(GeminiClient::new(gemini, timeout)?));
        }
        if let Some(replicate) = &config.replicate {
            generator =
                generator.with_text_to_image(Arc::new(ReplicateClient::new(replicate, timeout)?));
        }

        let mut builder = Self::builder(config.clone())
            .generator(generator)
            .usage(pool.map(|pool| UsageMeter::new(Arc::new(PgUsageStore::new(pool)))));
        if let Some(designer) = designer {
            builder = builder.designer(designer);
        }
        if let Some(blob) = &config.blob {
            builder = builder.blob(Arc::new(VercelBlobClient::new(blob)?));
        }
        if let Some(shopify) = &config.shopify {
            builder = builder.shopify(ShopifyClient::new(shopify, timeout)?);
        }
        if let Some(printify) = &config.printify {
            builder = builder.printify(PrintifyClient::new(printify, timeout)?);
        }
        if let Some(sprite) = &config.sprite {
            builder = builder.sprites(SpriteExtractor::new(sprite, timeout));
        }

        let state = builder.build();
        info!(
            generator = ?state.generator(),
            usage = state.usage().is_some(),
            blob = state.blob().is_some(),
            shopify = state.shopify().is_some(),
            printify = state.printify().is_some(),
            sprites = state.sprites().is_some(),
            "Application state ready"
        );
        Ok(state)
    }

    /// Start building a state with explicit dependencies.
    #[must_use]
    pub fn builder(config: ApiConfig) -> AppStateBuilder {
        AppStateBuilder::new(config)
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Provider orchestration for `/api/generate-sd`.
    #[must_use]
    pub fn generator(&self) -> &GeneratorStrategy {
        &self.inner.generator
    }

    /// Text-to-image provider for `/api/generate`.
    #[must_use]
    pub fn designer(&self) -> Option<&Arc<dyn TextToImage>> {
        self.inner.designer.as_ref()
    }

    #[must_use]
    pub fn usage(&self) -> Option<&UsageMeter> {
        self.inner.usage.as_ref()
    }

    #[must_use]
    pub fn blob(&self) -> Option<&Arc<dyn BlobStore>> {
        self.inner.blob.as_ref()
    }

    #[must_use]
    pub fn shopify(&self) -> Option<&ShopifyClient> {
        self.inner.shopify.as_ref()
    }

    #[must_use]
    pub fn printify(&self) -> Option<&PrintifyClient> {
        self.inner.printify.as_ref()
    }

    #[must_use]
    pub fn sprites(&self) -> Option<&SpriteExtractor> {
        self.inner.sprites.as_ref()
    }
}

/// Builder for [`AppState`], used by tests to inject stub providers.
pub struct AppStateBuilder {
    config: ApiConfig,
    generator: Option<GeneratorStrategy>,
    designer: Option<Arc<dyn TextToImage>>,
    usage: Option<UsageMeter>,
    blob: Option<Arc<dyn BlobStore>>,
    shopify: Option<ShopifyClient>,
    printify: Option<PrintifyClient>,
    sprites: Option<SpriteExtractor>,
}

impl AppStateBuilder {
    fn new(config: ApiConfig) -> Self {
        Self {
            config,
            generator: None,
            designer: None,
            usage: None,
            blob: None,
            shopify: None,
            printify: None,
            sprites: None,
        }
    }

    #[must_use]
    pub fn generator(mut self, generator: GeneratorStrategy) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn designer(mut self, designer: Arc<dyn TextToImage>) -> Self {
        self.designer = Some(designer);
        self
    }

    #[must_use]
    pub fn usage(mut self, usage: Option<UsageMeter>) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn blob(mut self, blob: Arc<dyn BlobStore>) -> Self {
        self.blob = Some(blob);
        self
    }

    #[must_use]
    pub fn shopify(mut self, shopify: ShopifyClient) -> Self {
        self.shopify = Some(shopify);
        self
    }

    #[must_use]
    pub fn printify(mut self, printify: PrintifyClient) -> Self {
        self.printify = Some(printify);
        self
    }

    #[must_use]
    pub fn sprites(mut self, sprites: SpriteExtractor) -> Self {
        self.sprites = Some(sprites);
        self
    }

    /// Finish building.
    ///
    /// Without a generator, one with no providers is used and every
    /// generation request fails with a configuration error.
    #[must_use]
    pub fn build(self) -> AppState {
        let generator = self.generator.unwrap_or_else(|| {
            GeneratorStrategy::new(ResponseNormalizer::new(Arc::new(NoFetch)))
        });

        AppState {
            inner: Arc::new(AppStateInner {
                config: self.config,
                generator,
                designer: self.designer,
                usage: self.usage,
                blob: self.blob,
                shopify: self.shopify,
                printify: self.printify,
                sprites: self.sprites,
            }),
        }
    }
}

/// Fetcher for a state built without a generator. Only provider output is
/// ever fetched, and such a state has no providers.
struct NoFetch;

#[async_trait::async_trait]
impl ImageFetcher for NoFetch {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage, ProviderError> {
        Err(ProviderError::new(
            "fetch",
            ProviderErrorKind::Transport,
            "image fetching is not configured",
        ))
    }
}
