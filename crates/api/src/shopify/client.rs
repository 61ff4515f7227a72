use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use super::ShopifyError;
use super::types::{
    AccessToken, AdminProduct, CollectionKind, CustomCollection, Metafield, NewCollection,
    NewMetafield, creator_collection_kind,
};
use crate::config::ShopifyConfig;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Page size for collection listing.
const COLLECTION_PAGE_LIMIT: u32 = 250;

/// Client for the Shopify Admin REST API and OAuth token endpoint.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    store_url: String,
    api_version: String,
    admin_token: Option<SecretString>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("store_url", &self.inner.store_url)
            .field("api_version", &self.inner.api_version)
            .field("admin_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// A creator's two collections, when they exist.
#[derive(Debug, Clone, Default)]
pub struct CreatorCollections {
    pub creator: Option<CustomCollection>,
    pub community: Option<CustomCollection>,
}

impl ShopifyClient {
    /// Create a new Shopify client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ShopifyConfig, timeout: Duration) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                client,
                store_url: config.store_url.trim_end_matches('/').to_string(),
                api_version: config.api_version.clone(),
                admin_token: config.admin_access_token.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            }),
        })
    }

    /// Store base URL, e.g. `https://shop.myshopify.com`.
    #[must_use]
    pub fn store_url(&self) -> &str {
        &self.inner.store_url
    }

    /// Whether OAuth app credentials are configured.
    #[must_use]
    pub fn has_oauth_credentials(&self) -> bool {
        self.inner.client_id.is_some() && self.inner.client_secret.is_some()
    }

    /// Whether an Admin API token is configured.
    #[must_use]
    pub fn has_admin_token(&self) -> bool {
        self.inner.admin_token.is_some()
    }

    fn admin_url(&self, path: &str) -> String {
        format!(
            "{}/admin/api/{}/{path}",
            self.inner.store_url, self.inner.api_version
        )
    }

    fn admin_token(&self) -> Result<&str, ShopifyError> {
        self.inner
            .admin_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or(ShopifyError::MissingAdminToken)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ShopifyError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShopifyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn admin_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ShopifyError> {
        let response = self
            .inner
            .client
            .get(self.admin_url(path))
            .header(ACCESS_TOKEN_HEADER, self.admin_token()?)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn admin_post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ShopifyError> {
        let response = self
            .inner
            .client
            .post(self.admin_url(path))
            .header(ACCESS_TOKEN_HEADER, self.admin_token()?)
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Exchange an OAuth authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Config` without app credentials, or an error if
    /// Shopify rejects the code.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, ShopifyError> {
        let (Some(client_id), Some(client_secret)) =
            (&self.inner.client_id, &self.inner.client_secret)
        else {
            return Err(ShopifyError::Config(
                "OAuth client credentials not configured".to_string(),
            ));
        };

        let response = self
            .inner
            .client
            .post(format!("{}/admin/oauth/access_token", self.inner.store_url))
            .json(&json!({
                "client_id": client_id,
                "client_secret": client_secret.expose_secret(),
                "code": code,
            }))
            .send()
            .await?;

        let token: AccessToken = Self::read(response).await?;
        info!(scope = %token.scope, "Exchanged Shopify authorization code");
        Ok(token)
    }

    /// Check whether an access token can read the shop.
    ///
    /// # Errors
    ///
    /// Returns error only when the request itself fails.
    #[instrument(skip(self, access_token))]
    pub async fn verify_token(&self, access_token: &str) -> Result<bool, ShopifyError> {
        let response = self
            .inner
            .client
            .get(self.admin_url("shop.json"))
            .header(ACCESS_TOKEN_HEADER, access_token)
            .send()
            .await?;
        let valid = response.status().is_success();
        debug!(valid, status = %response.status(), "Checked Shopify token");
        Ok(valid)
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Create a custom collection.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects the collection.
    #[instrument(skip(self, collection), fields(title = %collection.title))]
    pub async fn create_collection(
        &self,
        collection: &NewCollection,
    ) -> Result<CustomCollection, ShopifyError> {
        #[derive(Deserialize)]
        struct Created {
            custom_collection: CustomCollection,
        }

        let created: Created = self
            .admin_post(
                "custom_collections.json",
                &json!({ "custom_collection": collection }),
            )
            .await?;
        info!(collection_id = created.custom_collection.id, "Created collection");
        Ok(created.custom_collection)
    }

    /// List custom collections (first page of 250).
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn list_collections(&self) -> Result<Vec<CustomCollection>, ShopifyError> {
        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            custom_collections: Vec<CustomCollection>,
        }

        let listing: Listing = self
            .admin_get(&format!(
                "custom_collections.json?limit={COLLECTION_PAGE_LIMIT}"
            ))
            .await?;
        Ok(listing.custom_collections)
    }

    /// Metafields attached to a collection.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn collection_metafields(
        &self,
        collection_id: u64,
    ) -> Result<Vec<Metafield>, ShopifyError> {
        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            metafields: Vec<Metafield>,
        }

        let listing: Listing = self
            .admin_get(&format!(
                "custom_collections/{collection_id}/metafields.json"
            ))
            .await?;
        Ok(listing.metafields)
    }

    /// Find a creator's collections by their `creator` metafields.
    ///
    /// Collections whose metafields cannot be read are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if listing collections fails.
    #[instrument(skip(self))]
    pub async fn creator_collections(
        &self,
        creator_id: &str,
    ) -> Result<CreatorCollections, ShopifyError> {
        let mut found = CreatorCollections::default();

        for collection in self.list_collections().await? {
            let metafields = match self.collection_metafields(collection.id).await {
                Ok(metafields) => metafields,
                Err(e) => {
                    warn!(collection_id = collection.id, error = %e, "Skipping collection");
                    continue;
                }
            };

            match creator_collection_kind(&metafields, creator_id) {
                Some(CollectionKind::Creator) if found.creator.is_none() => {
                    found.creator = Some(collection);
                }
                Some(CollectionKind::Community) if found.community.is_none() => {
                    found.community = Some(collection);
                }
                _ => {}
            }

            if found.creator.is_some() && found.community.is_some() {
                break;
            }
        }

        Ok(found)
    }

    /// Products in a collection.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn collection_products(
        &self,
        collection_id: u64,
    ) -> Result<Vec<AdminProduct>, ShopifyError> {
        #[derive(Deserialize)]
        struct Listing {
            #[serde(default)]
            products: Vec<AdminProduct>,
        }

        let listing: Listing = self
            .admin_get(&format!("collections/{collection_id}/products.json"))
            .await?;
        Ok(listing.products)
    }

    /// Fetch a custom collection as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the collection does not exist.
    #[instrument(skip(self))]
    pub async fn get_collection(&self, collection_id: &str) -> Result<Value, ShopifyError> {
        let mut body: Map<String, Value> = self
            .admin_get(&format!("custom_collections/{collection_id}.json"))
            .await?;
        Ok(body.remove("custom_collection").unwrap_or(Value::Null))
    }

    /// Merge `updates` into a custom collection.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects the update.
    #[instrument(skip(self, updates))]
    pub async fn update_collection(
        &self,
        collection_id: &str,
        updates: Map<String, Value>,
    ) -> Result<Value, ShopifyError> {
        let mut collection = updates;
        collection.insert("id".to_string(), id_value(collection_id));

        let response = self
            .inner
            .client
            .put(self.admin_url(&format!("custom_collections/{collection_id}.json")))
            .header(ACCESS_TOKEN_HEADER, self.admin_token()?)
            .json(&json!({ "custom_collection": collection }))
            .send()
            .await?;
        let mut body: Map<String, Value> = Self::read(response).await?;
        info!("Updated collection");
        Ok(body.remove("custom_collection").unwrap_or(Value::Null))
    }

    /// Delete a custom collection.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects the delete.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, collection_id: &str) -> Result<(), ShopifyError> {
        let response = self
            .inner
            .client
            .delete(self.admin_url(&format!("custom_collections/{collection_id}.json")))
            .header(ACCESS_TOKEN_HEADER, self.admin_token()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ShopifyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        info!("Deleted collection");
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Add a product to a collection.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects the collect.
    #[instrument(skip(self))]
    pub async fn add_to_collection(
        &self,
        product_id: &str,
        collection_id: u64,
    ) -> Result<(), ShopifyError> {
        let _: Value = self
            .admin_post(
                "collects.json",
                &json!({
                    "collect": {
                        "product_id": id_value(product_id),
                        "collection_id": collection_id,
                    }
                }),
            )
            .await?;
        Ok(())
    }

    /// Attach a base64 image to a product.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects the image.
    #[instrument(skip(self, attachment), fields(size = attachment.len()))]
    pub async fn add_product_image(
        &self,
        product_id: &str,
        attachment: &str,
        alt: &str,
    ) -> Result<(), ShopifyError> {
        let _: Value = self
            .admin_post(
                &format!("products/{product_id}/images.json"),
                &json!({ "image": { "attachment": attachment, "alt": alt } }),
            )
            .await?;
        Ok(())
    }

    /// Add a metafield to a product.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Shopify rejects the metafield.
    #[instrument(skip(self, metafield), fields(key = %metafield.key))]
    pub async fn add_product_metafield(
        &self,
        product_id: &str,
        metafield: &NewMetafield,
    ) -> Result<(), ShopifyError> {
        let _: Value = self
            .admin_post(
                &format!("products/{product_id}/metafields.json"),
                &json!({ "metafield": metafield }),
            )
            .await?;
        Ok(())
    }

    /// A product's URL handle.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the product does not exist.
    #[instrument(skip(self))]
    pub async fn product_handle(&self, product_id: &str) -> Result<String, ShopifyError> {
        #[derive(Deserialize)]
        struct Wrapper {
            product: AdminProduct,
        }

        let wrapper: Wrapper = self
            .admin_get(&format!("products/{product_id}.json"))
            .await?;
        Ok(wrapper.product.handle)
    }
}

/// Numeric ids go to Shopify as numbers.
fn id_value(id: &str) -> Value {
    id.parse::<u64>()
        .map_or_else(|_| Value::String(id.to_string()), Value::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ShopifyConfig {
        ShopifyConfig {
            store_url: "https://shop.myshopify.com/".to_string(),
            api_version: "2025-04".to_string(),
            admin_access_token: None,
            client_id: Some("client".to_string()),
            client_secret: None,
        }
    }

    #[test]
    fn test_admin_url() {
        let client = ShopifyClient::new(&config(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.admin_url("shop.json"),
            "https://shop.myshopify.com/admin/api/2025-04/shop.json"
        );
    }

    #[test]
    fn test_credentials_flags() {
        let client = ShopifyClient::new(&config(), Duration::from_secs(5)).unwrap();
        assert!(!client.has_oauth_credentials());
        assert!(!client.has_admin_token());
        assert!(matches!(
            client.admin_token(),
            Err(ShopifyError::MissingAdminToken)
        ));
    }

    #[test]
    fn test_id_value() {
        assert_eq!(id_value("123"), json!(123));
        assert_eq!(id_value("gid://shopify/Product/1"), json!("gid://shopify/Product/1"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = config();
        config.admin_access_token = Some(SecretString::from("shpat_live_token"));
        let client = ShopifyClient::new(&config, Duration::from_secs(5)).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("shpat_live_token"));
    }
}
