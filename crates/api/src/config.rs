//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Server
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 5000)
//! - `PUBLIC_BASE_URL` - Public URL of this service (default: `http://localhost:5000`)
//! - `UPSTREAM_TIMEOUT_SECS` - Timeout for every outbound vendor call (default: 120)
//! - `IMAGE_FETCH_TIMEOUT_SECS` - Timeout for fetching generated images (default: 30)
//! - `MAX_BODY_BYTES` - Request body limit (default: 50 MB)
//! - `LOG_FORMAT` - `json` for structured logs
//!
//! ## Image generation (each optional)
//! - `OPENAI_API_KEY`, `OPENAI_API_URL` - DALL-E 3 and GPT-4o vision
//! - `GEMINI_API_KEY` (or `GOOGLE_API_KEY`), `GEMINI_API_URL` - Gemini image edit
//! - `REPLICATE_API_TOKEN`, `REPLICATE_API_URL` - SDXL and background removal
//!
//! ## Storefront platform (optional)
//! - `SHOPIFY_STORE_URL` - e.g. `https://your-store.myshopify.com`
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2025-04)
//! - `SHOPIFY_ADMIN_ACCESS_TOKEN` - Admin API token
//! - `SHOPIFY_CLIENT_ID`, `SHOPIFY_CLIENT_SECRET` - OAuth app credentials
//! - `SHOPIFY_WEBHOOK_SECRET` - Webhook signing secret
//! - `SHOPIFY_PRINTIFY_VARIANT_MAP` - `shopifyVariant:printifyVariant,...`
//!
//! ## Fulfillment provider (optional)
//! - `PRINTIFY_API_KEY`, `PRINTIFY_SHOP_ID`, `PRINTIFY_API_URL`
//! - `PRINTIFY_BLUEPRINT_ID` (default: 6), `PRINTIFY_PRINT_PROVIDER_ID` (default: 99)
//!
//! ## Storage and metering (optional)
//! - `BLOB_READ_WRITE_TOKEN`, `BLOB_API_URL` - Vercel Blob design storage
//! - `DATABASE_URL` - `PostgreSQL` connection string, enables usage metering
//!
//! ## Sprite extraction (optional)
//! - `SPRITE_EXTRACTOR_SCRIPT` - Path to the extractor script
//! - `PYTHON_BIN` - Interpreter (default: python3)
//!
//! ## Error tracking (optional)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default Shopify variant to Printify variant lookup for webhook orders.
pub const DEFAULT_VARIANT_MAP: &str = "52646156239213:64333";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this service
    pub public_base_url: String,
    /// Timeout applied to every outbound vendor request
    pub upstream_timeout: Duration,
    /// Timeout for fetching a generated image by URL
    pub image_fetch_timeout: Duration,
    /// Maximum accepted request body size
    pub max_body_bytes: usize,
    /// Emit JSON logs
    pub log_json: bool,
    /// `OpenAI` (DALL-E 3, GPT-4o)
    pub openai: Option<OpenAiConfig>,
    /// Google Gemini image model
    pub gemini: Option<GeminiConfig>,
    /// Replicate (SDXL, background removal)
    pub replicate: Option<ReplicateConfig>,
    /// Shopify Admin and OAuth
    pub shopify: Option<ShopifyConfig>,
    /// Shopify order webhook
    pub webhook: WebhookConfig,
    /// Printify
    pub printify: Option<PrintifyConfig>,
    /// Vercel Blob design storage
    pub blob: Option<BlobConfig>,
    /// Sprite extraction subprocess
    pub sprite: Option<SpriteConfig>,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            public_base_url: "http://localhost:5000".to_string(),
            upstream_timeout: Duration::from_secs(120),
            image_fetch_timeout: Duration::from_secs(30),
            max_body_bytes: 50 * 1024 * 1024,
            log_json: false,
            openai: None,
            gemini: None,
            replicate: None,
            shopify: None,
            webhook: WebhookConfig::default(),
            printify: None,
            blob: None,
            sprite: None,
            database_url: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

/// `OpenAI` API configuration.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: SecretString,
    pub api_url: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Google Gemini API configuration.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub api_url: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Replicate API configuration.
#[derive(Clone)]
pub struct ReplicateConfig {
    pub api_token: SecretString,
    pub api_url: String,
}

impl std::fmt::Debug for ReplicateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateConfig")
            .field("api_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Shopify store configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Store URL (e.g., `https://your-store.myshopify.com`)
    pub store_url: String,
    /// Admin REST API version (e.g., 2025-04)
    pub api_version: String,
    /// Admin API access token
    pub admin_access_token: Option<SecretString>,
    /// OAuth app client ID
    pub client_id: Option<String>,
    /// OAuth app client secret
    pub client_secret: Option<SecretString>,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("store_url", &self.store_url)
            .field("api_version", &self.api_version)
            .field(
                "admin_access_token",
                &self.admin_access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Shopify order webhook configuration.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Shared HMAC secret
    pub secret: Option<SecretString>,
    /// Shopify variant ID -> Printify variant ID
    pub variant_map: BTreeMap<String, u64>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            variant_map: parse_variant_map(DEFAULT_VARIANT_MAP).unwrap_or_default(),
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("variant_map", &self.variant_map)
            .finish()
    }
}

/// Printify API configuration.
#[derive(Clone)]
pub struct PrintifyConfig {
    pub api_key: SecretString,
    pub shop_id: String,
    pub api_url: String,
    /// Catalog blueprint used for t-shirts
    pub blueprint_id: u32,
    /// Print provider used for t-shirts
    pub print_provider_id: u32,
}

impl std::fmt::Debug for PrintifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintifyConfig")
            .field("api_key", &"[REDACTED]")
            .field("shop_id", &self.shop_id)
            .field("api_url", &self.api_url)
            .field("blueprint_id", &self.blueprint_id)
            .field("print_provider_id", &self.print_provider_id)
            .finish()
    }
}

/// Vercel Blob configuration.
#[derive(Clone)]
pub struct BlobConfig {
    pub token: SecretString,
    pub api_url: String,
}

impl std::fmt::Debug for BlobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobConfig")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Sprite extraction subprocess configuration.
#[derive(Debug, Clone)]
pub struct SpriteConfig {
    pub python_bin: String,
    pub script_path: PathBuf,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let host = parse_env("API_HOST", defaults.host)?;
        let port = parse_env("API_PORT", defaults.port)?;
        let public_base_url = get_env_or_default("PUBLIC_BASE_URL", &defaults.public_base_url)
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("PUBLIC_BASE_URL".to_string(), e.to_string()))?;

        let upstream_timeout =
            Duration::from_secs(parse_env("UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout.as_secs())?);
        let image_fetch_timeout = Duration::from_secs(parse_env(
            "IMAGE_FETCH_TIMEOUT_SECS",
            defaults.image_fetch_timeout.as_secs(),
        )?);
        let max_body_bytes = parse_env("MAX_BODY_BYTES", defaults.max_body_bytes)?;
        let log_json = get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            host,
            port,
            public_base_url,
            upstream_timeout,
            image_fetch_timeout,
            max_body_bytes,
            log_json,
            openai: OpenAiConfig::from_env(),
            gemini: GeminiConfig::from_env(),
            replicate: ReplicateConfig::from_env(),
            shopify: ShopifyConfig::from_env(),
            webhook: WebhookConfig::from_env()?,
            printify: PrintifyConfig::from_env()?,
            blob: BlobConfig::from_env(),
            sprite: SpriteConfig::from_env(),
            database_url: get_optional_env("DATABASE_URL").map(SecretString::from),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl OpenAiConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            api_key: get_optional_secret("OPENAI_API_KEY")?,
            api_url: get_env_or_default("OPENAI_API_URL", "https://api.openai.com/v1"),
        })
    }
}

impl GeminiConfig {
    fn from_env() -> Option<Self> {
        let api_key = get_optional_secret("GEMINI_API_KEY")
            .or_else(|| get_optional_secret("GOOGLE_API_KEY"))?;
        Some(Self {
            api_key,
            api_url: get_env_or_default(
                "GEMINI_API_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
        })
    }
}

impl ReplicateConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            api_token: get_optional_secret("REPLICATE_API_TOKEN")?,
            api_url: get_env_or_default("REPLICATE_API_URL", "https://api.replicate.com/v1"),
        })
    }
}

impl ShopifyConfig {
    fn from_env() -> Option<Self> {
        let store_url = get_optional_env("SHOPIFY_STORE_URL")?;
        Some(Self {
            store_url: normalize_store_url(&store_url),
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2025-04"),
            admin_access_token: get_optional_secret("SHOPIFY_ADMIN_ACCESS_TOKEN"),
            client_id: get_optional_env("SHOPIFY_CLIENT_ID"),
            client_secret: get_optional_secret("SHOPIFY_CLIENT_SECRET"),
        })
    }
}

impl WebhookConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_optional_secret("SHOPIFY_WEBHOOK_SECRET");
        if let Some(secret) = &secret {
            // Shopify generates this secret, so a weak value is reported, not rejected
            if let Err(e) = validate_secret_strength(secret.expose_secret(), "SHOPIFY_WEBHOOK_SECRET")
            {
                tracing::warn!(error = %e, "Webhook secret looks weak");
            }
        }

        let variant_map = parse_variant_map(&get_env_or_default(
            "SHOPIFY_PRINTIFY_VARIANT_MAP",
            DEFAULT_VARIANT_MAP,
        ))?;

        Ok(Self {
            secret,
            variant_map,
        })
    }
}

impl PrintifyConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(api_key), Some(shop_id)) = (
            get_optional_secret("PRINTIFY_API_KEY"),
            get_optional_env("PRINTIFY_SHOP_ID"),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            api_key,
            shop_id,
            api_url: get_env_or_default("PRINTIFY_API_URL", "https://api.printify.com/v1"),
            blueprint_id: parse_env("PRINTIFY_BLUEPRINT_ID", 6)?,
            print_provider_id: parse_env("PRINTIFY_PRINT_PROVIDER_ID", 99)?,
        }))
    }
}

impl BlobConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            token: get_optional_secret("BLOB_READ_WRITE_TOKEN")?,
            api_url: get_env_or_default("BLOB_API_URL", "https://blob.vercel-storage.com"),
        })
    }
}

impl SpriteConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            script_path: PathBuf::from(get_optional_env("SPRITE_EXTRACTOR_SCRIPT")?),
            python_bin: get_env_or_default("PYTHON_BIN", "python3"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get an optional environment variable as a secret.
fn get_optional_secret(key: &str) -> Option<SecretString> {
    get_optional_env(key).map(SecretString::from)
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Ensure the store URL has a scheme and no trailing slash.
fn normalize_store_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Parse `shopifyVariant:printifyVariant` pairs separated by commas.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if a pair is malformed.
pub fn parse_variant_map(raw: &str) -> Result<BTreeMap<String, u64>, ConfigError> {
    let invalid = |detail: String| {
        ConfigError::InvalidEnvVar("SHOPIFY_PRINTIFY_VARIANT_MAP".to_string(), detail)
    };

    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (shopify, printify) = pair
                .split_once(':')
                .ok_or_else(|| invalid(format!("expected shopify:printify, got '{pair}'")))?;
            let printify = printify
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid(format!("'{pair}': {e}")))?;
            Ok((shopify.trim().to_string(), printify))
        })
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-webhook-key", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_variant_map_default() {
        let map = parse_variant_map(DEFAULT_VARIANT_MAP).unwrap();
        assert_eq!(map.get("52646156239213"), Some(&64333));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_parse_variant_map_multiple_pairs() {
        let map = parse_variant_map(" 1:10, 2:20 ,").unwrap();
        assert_eq!(map.get("1"), Some(&10));
        assert_eq!(map.get("2"), Some(&20));
    }

    #[test]
    fn test_parse_variant_map_invalid() {
        assert!(parse_variant_map("1-10").is_err());
        assert!(parse_variant_map("1:ten").is_err());
    }

    #[test]
    fn test_normalize_store_url() {
        assert_eq!(
            normalize_store_url("shop.myshopify.com/"),
            "https://shop.myshopify.com"
        );
        assert_eq!(
            normalize_store_url("http://localhost:9000"),
            "http://localhost:9000"
        );
    }

    #[test]
    fn test_default_socket_addr() {
        let config = ApiConfig::default();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_printify_config_debug_redacts_secrets() {
        let config = PrintifyConfig {
            api_key: SecretString::from("super_secret_printify_key"),
            shop_id: "12345".to_string(),
            api_url: "https://api.printify.com/v1".to_string(),
            blueprint_id: 6,
            print_provider_id: 99,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("12345"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_printify_key"));
    }

    #[test]
    fn test_shopify_config_debug_redacts_secrets() {
        let config = ShopifyConfig {
            store_url: "https://test.myshopify.com".to_string(),
            api_version: "2025-04".to_string(),
            admin_access_token: Some(SecretString::from("shpat_super_secret")),
            client_id: Some("client_id_value".to_string()),
            client_secret: Some(SecretString::from("super_secret_client_secret")),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("client_id_value"));
        assert!(!debug_output.contains("shpat_super_secret"));
        assert!(!debug_output.contains("super_secret_client_secret"));
    }
}
