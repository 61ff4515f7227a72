//! Gemini image editing client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use tshirt_studio_core::DataUri;

use super::{
    EditRequest, EditedImage, ImageEditor, ProviderError, ProviderErrorKind, ProviderImage,
    error_from_response,
};
use crate::config::GeminiConfig;

const PROVIDER: &str = "gemini";
const EDIT_MODEL: &str = "gemini-2.5-flash-image";

/// Finish reasons that mean the safety system withheld the image.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_SAFETY",
    "BLOCKLIST",
    "SPII",
];

/// Gemini `generateContent` client used for direct image edits.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &GeminiConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(config.api_key.expose_secret()).map_err(|e| {
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
impl ImageEditor for GeminiClient {
    fn edit_model(&self) -> &'static str {
        EDIT_MODEL
    }

    #[instrument(skip(self, request), fields(model = EDIT_MODEL, images = request.images.len()))]
    async fn edit(&self, request: EditRequest<'_>) -> Result<EditedImage, ProviderError> {
        let body = request_body(request);

        let response = self
            .client
            .post(format!(
                "{}/models/{EDIT_MODEL}:generateContent",
                self.api_url
            ))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response, classify).await);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, &e))?;

        parse_edit_response(&payload)
    }
}

fn request_body(request: EditRequest<'_>) -> Value {
    let mut parts = vec![json!({ "text": request.instruction })];
    parts.extend(request.images.iter().map(|image| {
        json!({
            "inlineData": {
                "mimeType": image.mime(),
                "data": image.payload(),
            }
        })
    }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "temperature": 0.4,
            "topK": 32,
            "topP": 1,
        }
    })
}

/// Pull the first inline image out of a `generateContent` answer.
fn parse_edit_response(payload: &Value) -> Result<EditedImage, ProviderError> {
    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(ProviderError::new(
            PROVIDER,
            ProviderErrorKind::ContentPolicy,
            format!("prompt blocked: {reason}"),
        ));
    }

    let candidates = payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut blocked_reason = None;
    for candidate in candidates {
        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str)
            && BLOCKING_FINISH_REASONS.contains(&reason)
        {
            blocked_reason = Some(reason);
        }

        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for part in parts {
            let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
                continue;
            };
            let data = inline.get("data").and_then(Value::as_str).unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");

            let image = DataUri::from_base64(mime, data).map_err(|e| {
                ProviderError::new(PROVIDER, ProviderErrorKind::EmptyResponse, e.to_string())
            })?;
            let tokens = payload
                .pointer("/usageMetadata/totalTokenCount")
                .and_then(Value::as_u64);

            debug!(mime, tokens, "Gemini returned edited image");
            return Ok(EditedImage {
                image: ProviderImage::Inline(image),
                tokens,
            });
        }
    }

    match blocked_reason {
        Some(reason) => Err(ProviderError::new(
            PROVIDER,
            ProviderErrorKind::ContentPolicy,
            format!("image withheld: {reason}"),
        )),
        None => Err(ProviderError::new(
            PROVIDER,
            ProviderErrorKind::EmptyResponse,
            "response contained no image",
        )),
    }
}

/// Classify a Gemini error answer by its status string.
fn classify(status: u16, body: &str) -> ProviderErrorKind {
    let error_status = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/status").and_then(Value::as_str).map(str::to_string));
    let lowered = body.to_ascii_lowercase();

    if lowered.contains("safety") || lowered.contains("prohibited") {
        return ProviderErrorKind::ContentPolicy;
    }

    match error_status.as_deref() {
        Some("INVALID_ARGUMENT" | "FAILED_PRECONDITION") => ProviderErrorKind::InvalidInput,
        Some("UNAUTHENTICATED" | "PERMISSION_DENIED") => ProviderErrorKind::Auth,
        Some("RESOURCE_EXHAUSTED") => ProviderErrorKind::RateLimited,
        _ => ProviderErrorKind::from_status(status),
    }
}
