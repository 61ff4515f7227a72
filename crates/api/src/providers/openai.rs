//! `OpenAI` client: DALL-E 3 text-to-image and GPT-4o vision.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use tshirt_studio_core::DataUri;

use super::{
    Description, ProviderError, ProviderErrorKind, ProviderImage, TextToImage, VisionDescriber,
    error_from_response,
};
use crate::config::OpenAiConfig;

const PROVIDER: &str = "openai";
const IMAGE_MODEL: &str = "dall-e-3";
const VISION_MODEL: &str = "gpt-4o";

/// DALL-E 3 rejects prompts longer than this many characters.
pub const MAX_IMAGE_PROMPT_CHARS: usize = 4000;

/// Sampling temperature for image descriptions; kept low for repeatable output.
const VISION_TEMPERATURE: f32 = 0.2;
const VISION_MAX_TOKENS: u32 = 1200;

/// `OpenAI` API client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    quality: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl OpenAiClient {
    /// Create a new `OpenAI` client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| {
                ProviderError::new(
                    PROVIDER,
                    ProviderErrorKind::Auth,
                    format!("Invalid API key format: {e}"),
                )
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TextToImage for OpenAiClient {
    fn image_model(&self) -> &'static str {
        IMAGE_MODEL
    }

    #[instrument(skip(self, prompt), fields(model = IMAGE_MODEL, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<ProviderImage, ProviderError> {
        let prompt = truncate_chars(prompt, MAX_IMAGE_PROMPT_CHARS);
        let body = ImageGenerationRequest {
            model: IMAGE_MODEL,
            prompt,
            n: 1,
            size: "1024x1024",
            quality: "standard",
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response, classify).await);
        }

        let result: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        let image = result.data.into_iter().next().ok_or_else(|| {
            ProviderError::new(PROVIDER, ProviderErrorKind::EmptyResponse, "no image returned")
        })?;

        match (image.url, image.b64_json) {
            (Some(url), _) => Ok(ProviderImage::Url(url)),
            (None, Some(b64)) => DataUri::from_base64("image/png", &b64)
                .map(ProviderImage::Inline)
                .map_err(|e| {
                    ProviderError::new(PROVIDER, ProviderErrorKind::EmptyResponse, e.to_string())
                }),
            (None, None) => Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::EmptyResponse,
                "image has neither url nor b64_json",
            )),
        }
    }
}

#[async_trait]
impl VisionDescriber for OpenAiClient {
    fn vision_model(&self) -> &'static str {
        VISION_MODEL
    }

    #[instrument(skip(self, images, brief), fields(model = VISION_MODEL, images = images.len()))]
    async fn describe(
        &self,
        images: &[DataUri],
        brief: &str,
    ) -> Result<Description, ProviderError> {
        let mut content = vec![json!({ "type": "text", "text": brief })];
        content.extend(images.iter().map(|image| {
            json!({
                "type": "image_url",
                "image_url": { "url": image.to_string(), "detail": "high" }
            })
        }));

        let body = json!({
            "model": VISION_MODEL,
            "temperature": VISION_TEMPERATURE,
            "max_tokens": VISION_MAX_TOKENS,
            "messages": [{ "role": "user", "content": content }]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response, classify).await);
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        let text = result
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                ProviderError::new(
                    PROVIDER,
                    ProviderErrorKind::EmptyResponse,
                    "vision model returned no description",
                )
            })?;

        debug!(chars = text.len(), "Received image description");

        Ok(Description {
            text,
            tokens: result.usage.map(|u| u.total_tokens),
        })
    }
}

/// Classify an `OpenAI` error answer by its error code.
fn classify(status: u16, body: &str) -> ProviderErrorKind {
    let error = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let code = error.as_ref().and_then(|e| e.code.as_deref());
    let kind = error.as_ref().and_then(|e| e.kind.as_deref());

    match (code, kind) {
        (Some("content_policy_violation" | "moderation_blocked"), _) => {
            ProviderErrorKind::ContentPolicy
        }
        (Some("invalid_image" | "invalid_image_format" | "image_parse_error"), _) => {
            ProviderErrorKind::InvalidInput
        }
        (Some("rate_limit_exceeded"), _) | (_, Some("insufficient_quota")) => {
            ProviderErrorKind::RateLimited
        }
        (Some("invalid_api_key"), _) => ProviderErrorKind::Auth,
        _ => ProviderErrorKind::from_status(status),
    }
}

/// Cut `s` to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(idx, _)| &s[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_content_policy() {
        let body = r#"{"error":{"code":"content_policy_violation","message":"Your request was rejected as a result of our safety system.","type":"invalid_request_error"}}"#;
        assert_eq!(classify(400, body), ProviderErrorKind::ContentPolicy);
    }

    #[test]
    fn test_classify_invalid_image() {
        let body = r#"{"error":{"code":"invalid_image_format","message":"bad","type":"invalid_request_error"}}"#;
        assert_eq!(classify(400, body), ProviderErrorKind::InvalidInput);
    }

    #[test]
    fn test_classify_falls_back_to_status() {
        assert_eq!(classify(401, "not json"), ProviderErrorKind::Auth);
        assert_eq!(classify(500, "{}"), ProviderErrorKind::Upstream);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }
}
