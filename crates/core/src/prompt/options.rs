//! Style options and sprite references sent by the design editor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Style knobs selected in the design editor.
///
/// Deserialization is lenient: every field is read from an arbitrary JSON
/// value, and anything that is not a non-empty string (or, for the palette,
/// an array of strings) is treated as absent instead of failing the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", rename_all = "camelCase")]
pub struct StyleOptions {
    /// Art style, e.g. `Watercolor`. `Custom` defers to `custom_image_style`.
    pub image_style: Option<String>,
    /// Free-text art style used when `image_style` is `Custom`.
    pub custom_image_style: Option<String>,
    /// Color treatment, e.g. `Vibrant` or `Custom palette`.
    pub color_treatment: Option<String>,
    /// Colors listed when `color_treatment` is `Custom palette`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_palette_colors: Vec<String>,
    /// Visual effect, e.g. `Grain`. `None` disables it.
    pub effect_filter: Option<String>,
    /// Overall mood.
    pub mood_vibe: Option<String>,
    /// Text to render inside the design.
    pub text_in_gen_prompt: Option<String>,
    /// Preset text style. `Bold statement` is the editor default and adds nothing.
    pub text_style_option: Option<String>,
    /// Free-text text style.
    pub custom_text_style: Option<String>,
}

impl From<Value> for StyleOptions {
    fn from(value: Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_owned)
        };

        let custom_palette_colors = value
            .get("customPaletteColors")
            .and_then(Value::as_array)
            .map(|colors| {
                colors
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            image_style: text("imageStyle"),
            custom_image_style: text("customImageStyle"),
            color_treatment: text("colorTreatment"),
            custom_palette_colors,
            effect_filter: text("effectFilter"),
            mood_vibe: text("moodVibe"),
            text_in_gen_prompt: text("textInGenPrompt"),
            text_style_option: text("textStyleOption"),
            custom_text_style: text("customTextStyle"),
        }
    }
}

/// A sprite sub-image attached to a generation request.
///
/// A sprite is usable when it carries either inline image data or a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteReference {
    /// Inline image as a data URI.
    #[serde(default)]
    pub image_data: Option<String>,
    /// Older clients send the inline image under this key. It is never
    /// fetched.
    #[serde(default)]
    pub url: Option<String>,
    /// What to extract from the sprite.
    #[serde(default)]
    pub description: Option<String>,
}

impl SpriteReference {
    /// Whether the sprite carries any image source.
    #[must_use]
    pub fn has_image(&self) -> bool {
        let present = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.image_data) || present(&self.url)
    }

    /// The description, or `sprite image` when absent.
    #[must_use]
    pub fn label(&self) -> &str {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or("sprite image")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_options_from_camel_case_json() {
        let options: StyleOptions = serde_json::from_value(json!({
            "imageStyle": "Watercolor",
            "colorTreatment": "Custom palette",
            "customPaletteColors": ["#ff0000", "teal"],
            "moodVibe": "playful"
        }))
        .unwrap();

        assert_eq!(options.image_style.as_deref(), Some("Watercolor"));
        assert_eq!(options.custom_palette_colors, vec!["#ff0000", "teal"]);
        assert_eq!(options.mood_vibe.as_deref(), Some("playful"));
        assert_eq!(options.effect_filter, None);
    }

    #[test]
    fn test_options_ignore_malformed_values() {
        let options: StyleOptions = serde_json::from_value(json!({
            "imageStyle": 42,
            "colorTreatment": ["Vibrant"],
            "customPaletteColors": "red",
            "moodVibe": "   ",
            "effectFilter": null
        }))
        .unwrap();

        assert_eq!(options, StyleOptions::default());
    }

    #[test]
    fn test_options_from_non_object() {
        let options: StyleOptions = serde_json::from_value(json!("Watercolor")).unwrap();
        assert_eq!(options, StyleOptions::default());
    }

    #[test]
    fn test_sprite_has_image() {
        let empty = SpriteReference::default();
        assert!(!empty.has_image());

        let with_url = SpriteReference {
            url: Some("https://x/s.png".to_string()),
            ..SpriteReference::default()
        };
        assert!(with_url.has_image());
        assert_eq!(with_url.label(), "sprite image");
    }
}
