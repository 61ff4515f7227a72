//! Design generation routes.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use tshirt_studio_core::PromptAssembler;

use crate::error::{ApiJson, AppError, Result, add_breadcrumb, success};
use crate::generation::{GenerationError, GenerationRequest, validated_prompt};
use crate::providers::{ProviderErrorKind, ProviderImage};
use crate::services::QuotaCheck;
use crate::state::AppState;

const INVALID_PROMPT: &str = "Invalid prompt. Please try a different description.";
const DESIGN_FAILED: &str = "Failed to generate design. Please try again.";
const SAFETY_TRIGGERED: &str =
    "Content safety filter triggered. Please try a different prompt or image.";
const INVALID_IMAGE: &str = "Invalid image format. Please try a different image.";
const IMAGE_FAILED: &str = "Failed to generate image";

#[derive(Debug, Deserialize)]
pub struct DesignRequest {
    #[serde(default)]
    prompt: Option<String>,
}

/// `POST /api/generate`: one DALL-E 3 design from a short prompt.
///
/// The provider URL is returned as-is.
#[instrument(skip(state, body))]
pub async fn generate_design(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DesignRequest>,
) -> Result<Json<Value>> {
    let prompt =
        validated_prompt(body.prompt.as_deref()).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let designer = state
        .designer()
        .ok_or_else(|| AppError::NotConfigured("OpenAI API key not configured".to_string()))?;

    let image = designer
        .generate(&PromptAssembler::designer_prompt(prompt))
        .await
        .map_err(|e| match e.kind {
            ProviderErrorKind::ContentPolicy | ProviderErrorKind::InvalidInput => {
                warn!(error = %e, "Design prompt rejected");
                AppError::BadRequest(INVALID_PROMPT.to_string())
            }
            _ => AppError::failed(DESIGN_FAILED, e),
        })?;

    let image_url = match image {
        ProviderImage::Url(url) => url,
        ProviderImage::Inline(data) => data.to_string(),
    };
    info!(model = designer.image_model(), "Generated design");

    Ok(success(json!({
        "imageUrl": image_url,
        "prompt": prompt,
    })))
}

fn generation_error(err: GenerationError) -> AppError {
    match err.provider_kind() {
        Some(ProviderErrorKind::ContentPolicy) => {
            warn!(error = %err, "Generation blocked by content policy");
            AppError::BadRequest(SAFETY_TRIGGERED.to_string())
        }
        Some(ProviderErrorKind::InvalidInput) => {
            warn!(error = %err, "Generation rejected input");
            AppError::BadRequest(INVALID_IMAGE.to_string())
        }
        _ => AppError::failed(IMAGE_FAILED, err),
    }
}

/// `POST /api/generate-sd`: generate a print-ready design, optionally from
/// reference images and sprites, with per-creator metering.
#[instrument(skip(state, body))]
pub async fn generate_image(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GenerationRequest>,
) -> Result<Json<Value>> {
    let input = body
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let meter = input
        .creator_id
        .as_ref()
        .and_then(|creator| state.usage().map(|meter| (creator, meter)));

    if let Some((creator, meter)) = meter
        && let QuotaCheck::Exceeded { limit, used } = meter.check(creator).await
    {
        info!(creator = %creator, limit, used, "Monthly limit reached");
        return Err(AppError::QuotaExceeded { limit, used });
    }

    add_breadcrumb("generation", "Validated generation request");
    let outcome = state
        .generator()
        .generate(&input)
        .await
        .map_err(generation_error)?;

    if let Some((creator, meter)) = meter {
        meter.record(creator, outcome.tokens).await;
    }

    info!(
        model = %outcome.model,
        path = outcome.path.as_str(),
        tokens = outcome.tokens,
        "Generated image"
    );

    Ok(success(json!({
        "imageUrl": outcome.image.to_string(),
        "prompt": outcome.prompt,
        "model": outcome.model,
        "tokensUsed": outcome.tokens,
    })))
}
