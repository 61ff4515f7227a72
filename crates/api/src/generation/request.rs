//! Generation request parsing and validation.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tshirt_studio_core::prompt::MAX_REFERENCE_IMAGES;
use tshirt_studio_core::{CreatorId, DataUri, PromptAssembler, SpriteReference, StyleOptions};

/// Minimum trimmed prompt length.
pub const MIN_PROMPT_CHARS: usize = 3;

/// A rejected generation request. The display text is the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Please provide a detailed prompt")]
    PromptTooShort,

    #[error("A maximum of 5 reference images is supported")]
    TooManyImages,

    #[error("Invalid image format. Please try a different image.")]
    InvalidImage,

    #[error("Invalid creatorId")]
    InvalidCreatorId,
}

/// Body of `POST /api/generate-sd`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Editor-composed prompt; replaces `prompt` as the base when long enough.
    #[serde(default)]
    pub full_prompt: Option<Value>,
    /// Single reference image (older clients).
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub options: Option<StyleOptions>,
    #[serde(default)]
    pub sprites: Vec<SpriteReference>,
}

/// A validated generation request.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    /// Prompt with style options merged in.
    pub prompt: String,
    /// Reference images in request order.
    pub references: Vec<DataUri>,
    /// Sprite images in request order, attached after the references.
    pub sprite_images: Vec<DataUri>,
    /// Extraction instruction naming each sprite image.
    pub sprite_clause: Option<String>,
    pub creator_id: Option<CreatorId>,
}

/// Check that a prompt is long enough and return it trimmed.
///
/// # Errors
///
/// Returns `PromptTooShort` when the prompt is absent or shorter than
/// [`MIN_PROMPT_CHARS`] after trimming.
pub fn validated_prompt(prompt: Option<&str>) -> Result<&str, RequestError> {
    let prompt = prompt.map(str::trim).unwrap_or_default();
    if prompt.chars().count() < MIN_PROMPT_CHARS {
        return Err(RequestError::PromptTooShort);
    }
    Ok(prompt)
}

impl GenerationRequest {
    /// Validate the request and build the prompt to generate from.
    ///
    /// Nothing here performs I/O, so a rejected request never reaches a provider.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(self) -> Result<GenerationInput, RequestError> {
        let prompt = validated_prompt(self.prompt.as_deref())?;

        let base = self
            .full_prompt
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|full| full.chars().count() > MIN_PROMPT_CHARS)
            .unwrap_or(prompt);

        let raw_images: Vec<&str> = self
            .image
            .iter()
            .chain(self.images.iter())
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .collect();

        if raw_images.len() > MAX_REFERENCE_IMAGES {
            return Err(RequestError::TooManyImages);
        }

        let references = raw_images
            .into_iter()
            .map(|raw| {
                DataUri::parse(raw)
                    .ok()
                    .filter(DataUri::is_image)
                    .ok_or(RequestError::InvalidImage)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sprite_images = self
            .sprites
            .iter()
            .filter(|s| s.has_image())
            .map(sprite_image)
            .collect::<Result<Vec<_>, _>>()?;

        let creator_id = self
            .creator_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CreatorId::parse(id).map_err(|_| RequestError::InvalidCreatorId))
            .transpose()?;

        let options = self.options.unwrap_or_default();

        Ok(GenerationInput {
            prompt: PromptAssembler::assemble(base, &options),
            references,
            sprite_images,
            sprite_clause: PromptAssembler::sprite_instructions(&self.sprites),
            creator_id,
        })
    }
}

/// A sprite's inline image. Sprites are never fetched, so a `url` must hold
/// a data URI as well.
fn sprite_image(sprite: &SpriteReference) -> Result<DataUri, RequestError> {
    [sprite.image_data.as_deref(), sprite.url.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .and_then(|raw| DataUri::parse(raw).ok())
        .filter(DataUri::is_image)
        .ok_or(RequestError::InvalidImage)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn request(value: Value) -> GenerationRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_short_prompt_rejected() {
        for prompt in ["", "  ", "ab", "  ab  "] {
            let err = request(json!({ "prompt": prompt })).validate().unwrap_err();
            assert_eq!(err, RequestError::PromptTooShort);
        }
        let err = request(json!({})).validate().unwrap_err();
        assert_eq!(err, RequestError::PromptTooShort);
    }

    #[test]
    fn test_full_prompt_wins_when_long_enough() {
        let input = request(json!({ "prompt": "cat", "fullPrompt": "  a cat in space  " }))
            .validate()
            .unwrap();
        assert_eq!(input.prompt, "a cat in space");

        let input = request(json!({ "prompt": "a dog", "fullPrompt": "cat" }))
            .validate()
            .unwrap();
        assert_eq!(input.prompt, "a dog");

        let input = request(json!({ "prompt": "a dog", "fullPrompt": 42 }))
            .validate()
            .unwrap();
        assert_eq!(input.prompt, "a dog");
    }

    #[test]
    fn test_options_merged_into_prompt() {
        let input = request(json!({
            "prompt": "a fox",
            "options": { "moodVibe": "playful", "effectFilter": "None" }
        }))
        .validate()
        .unwrap();
        assert_eq!(input.prompt, "a fox The overall mood should be playful.");
    }

    #[test]
    fn test_single_and_multi_images_merged_in_order() {
        let jpeg = "data:image/jpeg;base64,/9j/4AAQ";
        let input = request(json!({ "prompt": "a fox", "image": PNG, "images": [jpeg] }))
            .validate()
            .unwrap();
        assert_eq!(input.references.len(), 2);
        assert_eq!(input.references[0].mime(), "image/png");
        assert_eq!(input.references[1].mime(), "image/jpeg");
    }

    #[test]
    fn test_too_many_images() {
        let images = vec![PNG; 6];
        let err = request(json!({ "prompt": "a fox", "images": images }))
            .validate()
            .unwrap_err();
        assert_eq!(err, RequestError::TooManyImages);
    }

    #[test]
    fn test_non_image_data_uri_rejected() {
        for bad in ["https://example.com/a.png", "data:text/plain;base64,aGk="] {
            let err = request(json!({ "prompt": "a fox", "images": [bad] }))
                .validate()
                .unwrap_err();
            assert_eq!(err, RequestError::InvalidImage);
        }
    }

    #[test]
    fn test_sprites_resolved_inline() {
        let input = request(json!({
            "prompt": "a fox",
            "sprites": [
                { "imageData": PNG, "description": " the red hat " },
                { "url": PNG },
                { "description": "no image" },
            ]
        }))
        .validate()
        .unwrap();

        assert_eq!(input.sprite_images.len(), 2);
        assert_eq!(
            input.sprite_clause.as_deref(),
            Some(
                " Extract the following elements from the attached sprite images and incorporate them into the final design: 1) the red hat; 2) sprite image."
            )
        );
    }

    #[test]
    fn test_remote_sprite_rejected() {
        for bad in [
            "http://127.0.0.1:8080/latest/meta-data/iam",
            "https://cdn.example.com/sprite.png",
            "data:text/plain;base64,aGk=",
        ] {
            let err = request(json!({ "prompt": "a fox", "sprites": [{ "url": bad }] }))
                .validate()
                .unwrap_err();
            assert_eq!(err, RequestError::InvalidImage);
        }
    }

    #[test]
    fn test_creator_id_validated() {
        let input = request(json!({ "prompt": "a fox", "creatorId": "creator_42" }))
            .validate()
            .unwrap();
        assert_eq!(input.creator_id.unwrap().as_str(), "creator_42");

        let err = request(json!({ "prompt": "a fox", "creatorId": "../etc" }))
            .validate()
            .unwrap_err();
        assert_eq!(err, RequestError::InvalidCreatorId);
    }
}
