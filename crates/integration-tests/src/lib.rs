//! Test harness for T-Shirt Studio integration tests.
//!
//! Every test runs the real router on an ephemeral port and talks to it over
//! HTTP. Vendor APIs are replaced by in-process stubs: provider traits and
//! stores get in-memory implementations, and Printify/Shopify REST calls go
//! to a local axum router standing in for the upstream.

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use tokio::net::TcpListener;

use tshirt_studio_api::config::{ApiConfig, PrintifyConfig, ShopifyConfig};
use tshirt_studio_api::generation::{GeneratorStrategy, ResponseNormalizer};
use tshirt_studio_api::printify::PrintifyClient;
use tshirt_studio_api::providers::{
    Description, EditRequest, EditedImage, FetchedImage, ImageEditor, ImageFetcher, ProviderError,
    ProviderErrorKind, ProviderImage, TextToImage, VisionDescriber,
};
use tshirt_studio_api::routes;
use tshirt_studio_api::services::{
    BlobError, BlobStore, StoredBlob, UsageError, UsageRecord, UsageStore,
};
use tshirt_studio_api::shopify::ShopifyClient;
use tshirt_studio_api::state::AppState;
use tshirt_studio_core::{CreatorId, DataUri, UsageMonth};

/// Smallest valid PNG signature plus two bytes: ten bytes total.
pub const TEN_BYTE_PNG: [u8; 10] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00];

const TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Servers
// =============================================================================

/// Serve `router` on 127.0.0.1 and return its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });
    format!("http://{addr}")
}

/// Serve the application router for `state` and return its base URL.
pub async fn spawn_app(state: AppState) -> String {
    spawn(routes::router(state)).await
}

/// HTTP client for calling the spawned app.
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(TIMEOUT)
        .build()
        .expect("Failed to create HTTP client")
}

/// Read a response as JSON, returning the status alongside.
pub async fn json_response(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json().await.expect("Response was not JSON");
    (status, body)
}

// =============================================================================
// Configuration
// =============================================================================

#[must_use]
pub fn printify_config(api_url: &str) -> PrintifyConfig {
    PrintifyConfig {
        api_key: SecretString::from("printify-test-key"),
        shop_id: "4815162".to_string(),
        api_url: api_url.to_string(),
        blueprint_id: 6,
        print_provider_id: 99,
    }
}

/// Printify client pointed at a stub upstream.
#[must_use]
pub fn printify_client(api_url: &str) -> PrintifyClient {
    PrintifyClient::new(&printify_config(api_url), TIMEOUT).expect("Invalid Printify config")
}

/// Shopify client with an Admin API token, pointed at a stub upstream.
#[must_use]
pub fn shopify_client(store_url: &str) -> ShopifyClient {
    let config = ShopifyConfig {
        store_url: store_url.to_string(),
        api_version: "2024-10".to_string(),
        admin_access_token: Some(SecretString::from("shpat_test")),
        client_id: Some("client-id".to_string()),
        client_secret: Some(SecretString::from("client-secret")),
    };
    ShopifyClient::new(&config, TIMEOUT).expect("Invalid Shopify config")
}

/// Default configuration with a webhook secret set.
#[must_use]
pub fn config_with_webhook_secret(secret: &str) -> ApiConfig {
    let mut config = ApiConfig::default();
    config.webhook.secret = Some(SecretString::from(secret));
    config
}

// =============================================================================
// Providers
// =============================================================================

fn stub_error(kind: ProviderErrorKind) -> ProviderError {
    ProviderError::http("stub", kind, 400, "stubbed failure")
}

/// Text-to-image provider with a fixed answer. Records the prompts it saw.
pub struct StubTextToImage {
    model: &'static str,
    result: Result<ProviderImage, ProviderErrorKind>,
    prompts: Mutex<Vec<String>>,
}

impl StubTextToImage {
    #[must_use]
    pub fn url(model: &'static str, url: &str) -> Arc<Self> {
        Arc::new(Self {
            model,
            result: Ok(ProviderImage::Url(url.to_string())),
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn inline(model: &'static str, image: DataUri) -> Arc<Self> {
        Arc::new(Self {
            model,
            result: Ok(ProviderImage::Inline(image)),
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn failing(model: &'static str, kind: ProviderErrorKind) -> Arc<Self> {
        Arc::new(Self {
            model,
            result: Err(kind),
            prompts: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl TextToImage for StubTextToImage {
    fn image_model(&self) -> &'static str {
        self.model
    }

    async fn generate(&self, prompt: &str) -> Result<ProviderImage, ProviderError> {
        self.prompts
            .lock()
            .expect("poisoned")
            .push(prompt.to_string());
        self.result.clone().map_err(stub_error)
    }
}

/// Image editor that always fails with `kind`, counting attempts.
pub struct FailingEditor {
    kind: ProviderErrorKind,
    calls: AtomicUsize,
}

impl FailingEditor {
    #[must_use]
    pub fn new(kind: ProviderErrorKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEditor for FailingEditor {
    fn edit_model(&self) -> &'static str {
        "stub-editor"
    }

    async fn edit(&self, _request: EditRequest<'_>) -> Result<EditedImage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(stub_error(self.kind))
    }
}

/// Vision provider returning a fixed description. Records the image count
/// and brief of every call.
pub struct StubDescriber {
    text: String,
    tokens: u64,
    seen: Mutex<Vec<(usize, String)>>,
}

impl StubDescriber {
    #[must_use]
    pub fn new(text: &str, tokens: u64) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            tokens,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn seen(&self) -> Vec<(usize, String)> {
        self.seen.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl VisionDescriber for StubDescriber {
    fn vision_model(&self) -> &'static str {
        "stub-vision"
    }

    async fn describe(
        &self,
        images: &[DataUri],
        brief: &str,
    ) -> Result<Description, ProviderError> {
        self.seen
            .lock()
            .expect("poisoned")
            .push((images.len(), brief.to_string()));
        Ok(Description {
            text: self.text.clone(),
            tokens: Some(self.tokens),
        })
    }
}

/// Fetcher that serves the same bytes for every URL.
pub struct StubFetcher {
    bytes: Vec<u8>,
    content_type: &'static str,
}

impl StubFetcher {
    #[must_use]
    pub fn png() -> Arc<Self> {
        Arc::new(Self {
            bytes: TEN_BYTE_PNG.to_vec(),
            content_type: "image/png",
        })
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage, ProviderError> {
        Ok(FetchedImage {
            bytes: self.bytes.clone(),
            content_type: Some(self.content_type.to_string()),
        })
    }
}

/// Strategy with no providers whose normalizer serves [`TEN_BYTE_PNG`].
#[must_use]
pub fn stub_strategy() -> GeneratorStrategy {
    GeneratorStrategy::new(ResponseNormalizer::new(StubFetcher::png()))
}

/// A small PNG reference image as a data URI string.
#[must_use]
pub fn png_data_uri() -> String {
    DataUri::from_bytes("image/png", &TEN_BYTE_PNG).to_string()
}

// =============================================================================
// Stores
// =============================================================================

/// Usage counters held in memory.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: Mutex<HashMap<String, UsageRecord>>,
}

impl MemoryUsageStore {
    /// Seed a creator with a limit and this month's usage.
    pub fn seed(&self, creator: &str, monthly_limit: Option<i64>, monthly_used: i64) {
        let creator_id = CreatorId::parse(creator).expect("Invalid creator id");
        self.records.lock().expect("poisoned").insert(
            creator.to_string(),
            UsageRecord {
                creator_id,
                monthly_limit,
                monthly_used,
                total_used: monthly_used,
                image_generation_used: monthly_used,
                usage_month: UsageMonth::current(),
            },
        );
    }

    #[must_use]
    pub fn get(&self, creator: &str) -> Option<UsageRecord> {
        self.records.lock().expect("poisoned").get(creator).cloned()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn load(&self, creator: &CreatorId) -> Result<Option<UsageRecord>, UsageError> {
        Ok(self.get(creator.as_str()))
    }

    async fn record(
        &self,
        creator: &CreatorId,
        month: &UsageMonth,
        tokens: i64,
    ) -> Result<(), UsageError> {
        let mut records = self.records.lock().expect("poisoned");
        let record = records
            .entry(creator.as_str().to_string())
            .or_insert_with(|| UsageRecord {
                creator_id: creator.clone(),
                monthly_limit: None,
                monthly_used: 0,
                total_used: 0,
                image_generation_used: 0,
                usage_month: month.clone(),
            });
        if &record.usage_month != month {
            record.monthly_used = 0;
            record.usage_month = month.clone();
        }
        record.monthly_used += tokens;
        record.total_used += tokens;
        record.image_generation_used += tokens;
        Ok(())
    }

    async fn ping(&self) -> Result<(), UsageError> {
        Ok(())
    }
}

/// Blob store that keeps the last object written to each path.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryBlobStore {
    /// Content type and bytes stored at `pathname`.
    #[must_use]
    pub fn object(&self, pathname: &str) -> Option<(String, Vec<u8>)> {
        self.objects.lock().expect("poisoned").get(pathname).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        pathname: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob, BlobError> {
        self.objects
            .lock()
            .expect("poisoned")
            .insert(pathname.to_string(), (content_type.to_string(), bytes));
        Ok(StoredBlob {
            url: format!("https://blob.test/{pathname}"),
            pathname: pathname.to_string(),
        })
    }
}
