//! Replicate client: SDXL text-to-image followed by background removal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use super::{ProviderError, ProviderErrorKind, ProviderImage, TextToImage, error_from_response};
use crate::config::ReplicateConfig;

const PROVIDER: &str = "replicate";
const IMAGE_MODEL: &str = "sdxl+remove-bg";

const SDXL_VERSION: &str = "7762fd07cf82c948538e41f63f77d685e02b063e37e496e96eefd46c929f9bdc";
const REMOVE_BG_VERSION: &str = "95fcc2a26d3899cd6c2691c900465aaeff466285a65c14638cc5f36f34befaf1";

const NEGATIVE_PROMPT: &str =
    "blurry, low quality, distorted, deformed, ugly, bad anatomy, background clutter";

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 180;

/// Replicate predictions client.
#[derive(Clone)]
pub struct ReplicateClient {
    client: reqwest::Client,
    api_url: String,
    poll_interval: Duration,
}

impl std::fmt::Debug for ReplicateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Value,
    error: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl ReplicateClient {
    /// Create a new Replicate client.
    ///
    /// # Errors
    ///
    /// Returns error if the API token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ReplicateConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| {
                ProviderError::new(
                    PROVIDER,
                    ProviderErrorKind::Auth,
                    format!("Invalid API token format: {e}"),
                )
            })?,
        );
        headers.insert("Prefer", HeaderValue::from_static("wait"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            poll_interval: POLL_INTERVAL,
        })
    }

    /// Override the delay between status polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run a prediction to completion and return the first output URL.
    #[instrument(skip(self, input))]
    async fn run(&self, version: &str, input: Value) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/predictions", self.api_url))
            .json(&json!({ "version": version, "input": input }))
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response, classify).await);
        }

        let mut prediction: Prediction = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        let mut polls = 0;
        while !prediction.status.is_terminal() {
            if polls >= MAX_POLLS {
                return Err(ProviderError::new(
                    PROVIDER,
                    ProviderErrorKind::Transport,
                    format!("prediction {} did not finish", prediction.id),
                ));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.get_prediction(&prediction.id).await?;
        }

        debug!(id = %prediction.id, polls, status = ?prediction.status, "Prediction finished");

        match prediction.status {
            PredictionStatus::Succeeded => first_url(&prediction.output).ok_or_else(|| {
                ProviderError::new(
                    PROVIDER,
                    ProviderErrorKind::EmptyResponse,
                    "prediction produced no output URL",
                )
            }),
            _ => {
                let message = prediction
                    .error
                    .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                    .unwrap_or_else(|| format!("prediction {}", prediction.id));
                Err(ProviderError::new(PROVIDER, failure_kind(&message), message))
            }
        }
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction, ProviderError> {
        let response = self
            .client
            .get(format!("{}/predictions/{id}", self.api_url))
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response, classify).await);
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))
    }
}

#[async_trait]
impl TextToImage for ReplicateClient {
    fn image_model(&self) -> &'static str {
        IMAGE_MODEL
    }

    #[instrument(skip(self, prompt), fields(model = IMAGE_MODEL))]
    async fn generate(&self, prompt: &str) -> Result<ProviderImage, ProviderError> {
        let sdxl_url = self
            .run(
                SDXL_VERSION,
                json!({
                    "prompt": prompt,
                    "negative_prompt": NEGATIVE_PROMPT,
                    "width": 1024,
                    "height": 1024,
                    "num_outputs": 1,
                    "scheduler": "K_EULER",
                    "num_inference_steps": 25,
                    "guidance_scale": 7.5,
                }),
            )
            .await?;

        // Background removal is best effort.
        match self
            .run(REMOVE_BG_VERSION, json!({ "image": sdxl_url }))
            .await
        {
            Ok(url) => Ok(ProviderImage::Url(url)),
            Err(e) => {
                warn!(error = %e, "Background removal failed, using SDXL output");
                Ok(ProviderImage::Url(sdxl_url))
            }
        }
    }
}

/// Find the first URL in a prediction output, which may be a string, an
/// array, or an object depending on the model.
fn first_url(output: &Value) -> Option<String> {
    match output {
        Value::String(s) if s.starts_with("http") || s.starts_with("data:") => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_url),
        Value::Object(map) => map.values().find_map(first_url),
        _ => None,
    }
}

fn failure_kind(message: &str) -> ProviderErrorKind {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("nsfw") || lowered.contains("safety") {
        ProviderErrorKind::ContentPolicy
    } else {
        ProviderErrorKind::Upstream
    }
}

fn classify(status: u16, body: &str) -> ProviderErrorKind {
    match failure_kind(body) {
        ProviderErrorKind::ContentPolicy => ProviderErrorKind::ContentPolicy,
        _ => ProviderErrorKind::from_status(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_url_shapes() {
        assert_eq!(
            first_url(&json!("https://r.io/a.png")).as_deref(),
            Some("https://r.io/a.png")
        );
        assert_eq!(
            first_url(&json!(["https://r.io/a.png", "https://r.io/b.png"])).as_deref(),
            Some("https://r.io/a.png")
        );
        assert_eq!(
            first_url(&json!({ "image": ["https://r.io/c.png"] })).as_deref(),
            Some("https://r.io/c.png")
        );
        assert_eq!(first_url(&json!(null)), None);
        assert_eq!(first_url(&json!(["not a url"])), None);
    }

    #[test]
    fn test_failure_kind() {
        assert_eq!(
            failure_kind("NSFW content detected. Try running it again"),
            ProviderErrorKind::ContentPolicy
        );
        assert_eq!(failure_kind("CUDA out of memory"), ProviderErrorKind::Upstream);
    }

    #[test]
    fn test_status_deserializes_unknown() {
        let p: Prediction =
            serde_json::from_str(r#"{"id":"x","status":"queued","output":null}"#).unwrap();
        assert_eq!(p.status, PredictionStatus::Unknown);
        assert!(!p.status.is_terminal());
    }
}
