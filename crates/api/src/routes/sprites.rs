//! Sprite extraction from an uploaded image.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};
use tshirt_studio_core::DataUri;

use crate::error::{ApiJson, AppError, Result, success};
use crate::services::SpriteError;
use crate::state::AppState;

const MIN_DESCRIPTION_CHARS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractSpriteRequest {
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    element_description: Option<String>,
}

fn sprite_error(err: SpriteError) -> AppError {
    let summary = match &err {
        SpriteError::Failed { stderr, .. } => {
            tracing::error!(stderr = %stderr, "Sprite extractor failed");
            "Sprite extraction failed"
        }
        SpriteError::InvalidOutput => "Invalid extractor output",
        SpriteError::Parse(_) => "Failed to parse extractor output",
        SpriteError::Io(_) | SpriteError::Timeout(_) => "Failed to extract sprite",
    };
    AppError::failed(summary, err)
}

/// `POST /api/extract-sprite`: cut one described element out of an image.
#[instrument(skip_all)]
pub async fn extract_sprite(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ExtractSpriteRequest>,
) -> Result<Json<Value>> {
    let image = body
        .image_data
        .as_deref()
        .and_then(|d| DataUri::parse(d).ok())
        .filter(DataUri::is_image)
        .ok_or_else(|| {
            AppError::BadRequest("imageData (base64 data URL) is required".to_string())
        })?;
    let description = body
        .element_description
        .as_deref()
        .map(str::trim)
        .filter(|d| d.chars().count() >= MIN_DESCRIPTION_CHARS)
        .ok_or_else(|| AppError::BadRequest("elementDescription is required".to_string()))?;

    let extractor = state
        .sprites()
        .ok_or_else(|| AppError::NotConfigured("Sprite extraction not configured".to_string()))?;

    let sprite_url = extractor
        .extract(&image, description)
        .await
        .map_err(sprite_error)?;

    info!(description, "Extracted sprite");
    Ok(success(json!({
        "spriteImageUrl": sprite_url,
        "description": description,
    })))
}
