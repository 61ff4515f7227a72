use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::PrintifyError;
use super::types::{
    CreatedProduct, ImageUpload, NewOrder, NewProduct, Product, ProductUpdate, PublishFields,
    PublishResult, UploadedImage,
};
use crate::config::PrintifyConfig;

/// How long catalog variants are reused.
const VARIANT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Catalog variants for the configured blueprint and print provider.
#[derive(Debug, Clone)]
pub struct VariantCatalog {
    pub data: Arc<Value>,
    pub fetched_at: DateTime<Utc>,
    /// Served from the cache rather than fetched.
    pub cached: bool,
}

#[derive(Clone)]
struct CachedVariants {
    data: Arc<Value>,
    fetched_at: DateTime<Utc>,
}

/// Client for the Printify REST API.
#[derive(Clone)]
pub struct PrintifyClient {
    inner: Arc<PrintifyClientInner>,
}

struct PrintifyClientInner {
    client: reqwest::Client,
    api_url: String,
    shop_id: String,
    blueprint_id: u32,
    print_provider_id: u32,
    variants: Cache<(u32, u32), CachedVariants>,
}

impl std::fmt::Debug for PrintifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintifyClient")
            .field("api_url", &self.inner.api_url)
            .field("shop_id", &self.inner.shop_id)
            .finish_non_exhaustive()
    }
}

impl PrintifyClient {
    /// Create a new Printify client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &PrintifyConfig, timeout: Duration) -> Result<Self, PrintifyError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PrintifyError::Config(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let variants = Cache::builder()
            .max_capacity(16)
            .time_to_live(VARIANT_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(PrintifyClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                shop_id: config.shop_id.clone(),
                blueprint_id: config.blueprint_id,
                print_provider_id: config.print_provider_id,
                variants,
            }),
        })
    }

    #[must_use]
    pub fn blueprint_id(&self) -> u32 {
        self.inner.blueprint_id
    }

    #[must_use]
    pub fn print_provider_id(&self) -> u32 {
        self.inner.print_provider_id
    }

    fn shop_url(&self, path: &str) -> String {
        format!("{}/shops/{}/{path}", self.inner.api_url, self.inner.shop_id)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PrintifyError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PrintifyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T, PrintifyError> {
        let response = self.inner.client.post(url).json(body).send().await?;
        Self::read(response).await
    }

    /// Upload a base64 image to the media library.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Printify rejects the upload.
    #[instrument(skip(self, contents), fields(size = contents.len()))]
    pub async fn upload_image(
        &self,
        file_name: &str,
        contents: &str,
    ) -> Result<UploadedImage, PrintifyError> {
        let image: UploadedImage = self
            .post(
                format!("{}/uploads/images.json", self.inner.api_url),
                &ImageUpload {
                    file_name,
                    contents,
                },
            )
            .await?;
        info!(image_id = %image.id, "Uploaded image to Printify");
        Ok(image)
    }

    /// Create a product in the shop.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Printify rejects the product.
    #[instrument(skip(self, product), fields(title = %product.title))]
    pub async fn create_product(
        &self,
        product: &NewProduct,
    ) -> Result<CreatedProduct, PrintifyError> {
        let created: CreatedProduct = self.post(self.shop_url("products.json"), product).await?;
        info!(product_id = %created.id, "Created Printify product");
        Ok(created)
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Printify rejects the update.
    #[instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        product_id: &str,
        update: &ProductUpdate,
    ) -> Result<(), PrintifyError> {
        let response = self
            .inner
            .client
            .put(self.shop_url(&format!("products/{product_id}.json")))
            .json(update)
            .send()
            .await?;
        let _: Value = Self::read(response).await?;
        debug!("Updated Printify product");
        Ok(())
    }

    /// Fetch a product with its mockups.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the product does not exist.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: &str) -> Result<Product, PrintifyError> {
        let response = self
            .inner
            .client
            .get(self.shop_url(&format!("products/{product_id}.json")))
            .send()
            .await?;
        Self::read(response).await
    }

    /// Publish a product to the connected store.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Printify rejects the publish.
    #[instrument(skip(self, fields))]
    pub async fn publish_product(
        &self,
        product_id: &str,
        fields: PublishFields,
    ) -> Result<PublishResult, PrintifyError> {
        let result: PublishResult = self
            .post(
                self.shop_url(&format!("products/{product_id}/publish.json")),
                &fields,
            )
            .await?;
        info!(external_id = ?result.external_id(), "Published Printify product");
        Ok(result)
    }

    /// Catalog variants for the configured blueprint, cached for an hour.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog must be fetched and the request fails.
    #[instrument(skip(self))]
    pub async fn blueprint_variants(&self) -> Result<VariantCatalog, PrintifyError> {
        let key = (self.inner.blueprint_id, self.inner.print_provider_id);

        if let Some(hit) = self.inner.variants.get(&key).await {
            debug!("Cache hit for variants");
            return Ok(VariantCatalog {
                data: hit.data,
                fetched_at: hit.fetched_at,
                cached: true,
            });
        }

        let response = self
            .inner
            .client
            .get(format!(
                "{}/catalog/blueprints/{}/print_providers/{}/variants.json",
                self.inner.api_url, key.0, key.1
            ))
            .send()
            .await?;
        let data: Value = Self::read(response).await?;

        let entry = CachedVariants {
            data: Arc::new(data),
            fetched_at: Utc::now(),
        };
        self.inner.variants.insert(key, entry.clone()).await;

        Ok(VariantCatalog {
            data: entry.data,
            fetched_at: entry.fetched_at,
            cached: false,
        })
    }

    /// Drop cached catalog variants.
    pub async fn clear_variant_cache(&self) {
        self.inner.variants.invalidate_all();
        self.inner.variants.run_pending_tasks().await;
        info!("Cleared Printify variant cache");
    }

    /// Create an order in the shop.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Printify rejects the order.
    #[instrument(skip(self, order), fields(external_id = %order.external_id))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Value, PrintifyError> {
        let created: Value = self.post(self.shop_url("orders.json"), order).await?;
        info!(order_id = ?created.get("id"), "Created Printify order");
        Ok(created)
    }
}
