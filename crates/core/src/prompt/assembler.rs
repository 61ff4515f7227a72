//! Deterministic prompt assembly.
//!
//! Every function here is a pure string transform: identical inputs always
//! produce identical output, and an absent option never contributes text.

use std::fmt::Write as _;

use super::options::{SpriteReference, StyleOptions};

/// Maximum number of reference images a single request may carry.
pub const MAX_REFERENCE_IMAGES: usize = 5;

const ORDINALS: [&str; MAX_REFERENCE_IMAGES] = ["first", "second", "third", "fourth", "fifth"];

const PRINT_READY_SUFFIX: &str = ", isolated subject, centered composition, simple clean background, high quality, detailed, vibrant artwork, professional design, print-ready, no background clutter";

const INTEGRITY_CLAUSE: &str = " Never change the integrity of the original image. Keep the main elements, background, and overall visual consistency of the original image unless the user specifically asks for a change. Maintain the same background style and appearance as the reference image.";

/// Builds the prompt text sent to image generators.
pub struct PromptAssembler;

impl PromptAssembler {
    /// Merge style options into a base prompt.
    ///
    /// Clauses are appended in a fixed order: art style, color treatment,
    /// visual effect, mood, embedded text. Sentinel values that mean "no
    /// change" (`realistic photo`, `keep original colors`, `None`,
    /// `Bold statement`) contribute nothing.
    #[must_use]
    pub fn assemble(base: &str, options: &StyleOptions) -> String {
        let mut prompt = base.trim().to_owned();

        if let Some(style) = art_style(options) {
            let _ = write!(prompt, " Render in a {style} art style.");
        }

        if let Some(treatment) = options
            .color_treatment
            .as_deref()
            .filter(|t| !contains_ignore_case(t, "keep original colors"))
        {
            if treatment == "Custom palette" && !options.custom_palette_colors.is_empty() {
                let _ = write!(
                    prompt,
                    " Use a custom color palette with colors: {}.",
                    options.custom_palette_colors.join(", ")
                );
            } else {
                let _ = write!(prompt, " Apply {treatment} color treatment.");
            }
        }

        if let Some(effect) = options.effect_filter.as_deref().filter(|e| *e != "None") {
            let _ = write!(prompt, " Add {effect} visual effect.");
        }

        if let Some(mood) = options.mood_vibe.as_deref() {
            let _ = write!(prompt, " The overall mood should be {mood}.");
        }

        if let Some(text) = options
            .text_in_gen_prompt
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let _ = write!(prompt, " Incorporate this text: \"{text}\"");
            match (
                options
                    .text_style_option
                    .as_deref()
                    .filter(|s| *s != "Bold statement"),
                options
                    .custom_text_style
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty()),
            ) {
                (Some(style), _) => {
                    let _ = write!(prompt, " in a {style} style.");
                }
                (None, Some(custom)) => {
                    let _ = write!(prompt, " in this text style: {custom}.");
                }
                (None, None) => prompt.push('.'),
            }
        }

        prompt
    }

    /// Wrap a user prompt for the quick single-shot designer endpoint.
    #[must_use]
    pub fn designer_prompt(prompt: &str) -> String {
        format!(
            "Create a t-shirt graphic design: {}. The design should be centered, bold, and suitable for screen printing on a t-shirt.",
            prompt.trim()
        )
    }

    /// Extend a prompt for text-only generation of an isolated, printable subject.
    #[must_use]
    pub fn print_ready_prompt(prompt: &str) -> String {
        format!("{prompt}{PRINT_READY_SUFFIX}")
    }

    /// Ordinal label for the reference image at `index` (zero-based).
    #[must_use]
    pub fn ordinal_label(index: usize) -> String {
        ORDINALS.get(index).map_or_else(
            || format!("image {}", index + 1),
            |ordinal| format!("{ordinal} image"),
        )
    }

    /// Extraction instructions for the usable sprites, in order.
    ///
    /// Returns `None` when no sprite carries an image.
    #[must_use]
    pub fn sprite_instructions(sprites: &[SpriteReference]) -> Option<String> {
        let items: Vec<String> = sprites
            .iter()
            .filter(|s| s.has_image())
            .enumerate()
            .map(|(i, s)| format!("{}) {}", i + 1, s.label()))
            .collect();

        if items.is_empty() {
            return None;
        }

        Some(format!(
            " Extract the following elements from the attached sprite images and incorporate them into the final design: {}.",
            items.join("; ")
        ))
    }

    /// The instruction sent to an image-edit model along with the references.
    ///
    /// With several references, each is named by ordinal position so the
    /// model can tell them apart.
    #[must_use]
    pub fn reference_instruction(prompt: &str, reference_count: usize) -> String {
        let lead = if reference_count <= 1 {
            "Based on this reference image,".to_owned()
        } else {
            format!(
                "Based on these {reference_count} reference images ({}),",
                reference_labels(reference_count)
            )
        };

        format!(
            "{lead} {} Generate a high-quality, print-ready design.{INTEGRITY_CLAUSE}",
            prompt.trim()
        )
    }

    /// The brief sent to a vision model when a direct edit is not possible.
    ///
    /// The model's answer becomes the prompt of a text-only generator, so the
    /// brief asks for a self-contained description of the final design.
    #[must_use]
    pub fn vision_brief(prompt: &str, reference_count: usize) -> String {
        let subject = if reference_count <= 1 {
            "the attached reference image".to_owned()
        } else {
            format!(
                "each of the {reference_count} attached reference images ({})",
                reference_labels(reference_count)
            )
        };

        format!(
            "You are writing a prompt for a text-to-image model that cannot see any images. \
             Describe {subject} exhaustively: main subject, composition, proportions, colors, \
             background, line work and art style. Then apply this requested change: {} \
             Respond with one self-contained image-generation prompt, under 900 words, that \
             describes the final t-shirt design with the change applied while preserving \
             everything that was not asked to change. Do not refer to the reference images.",
            prompt.trim()
        )
    }
}

fn art_style(options: &StyleOptions) -> Option<&str> {
    let style = match options.image_style.as_deref()? {
        "Custom" => options.custom_image_style.as_deref()?,
        other => other,
    };
    (!contains_ignore_case(style, "realistic photo")).then_some(style)
}

fn reference_labels(count: usize) -> String {
    (0..count)
        .map(PromptAssembler::ordinal_label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
