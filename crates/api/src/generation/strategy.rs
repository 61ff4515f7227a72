//! Provider selection and fallback for design generation.
//!
//! A request without reference images goes straight to text-to-image. A
//! request with references first tries a direct edit; when that fails the
//! references are described by a vision model and the description is handed
//! to a text-to-image generator. There are no other retries.
//!
//! ```text
//! NoImage ──────────────────────────────────────────────┐
//! WithImages ─► EditAttempt ──ok──────────────────────► Done
//!                    │ err                              ▲
//!                    ▼                                  │
//!             FallbackAnalysis ──ok─────────────────────┘
//!                    │ err
//!                    ▼
//!                  Failed
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};
use tshirt_studio_core::{DataUri, PromptAssembler};

use super::normalize::{NormalizeError, ResponseNormalizer};
use super::request::GenerationInput;
use crate::providers::{
    EditRequest, ImageEditor, ProviderError, ProviderErrorKind, ProviderImage, TextToImage,
    VisionDescriber,
};

/// Longest description forwarded from the vision model to the generator.
pub const MAX_FALLBACK_PROMPT_CHARS: usize = 4000;

/// Which provider path produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPath {
    TextOnly,
    DirectEdit,
    VisionFallback,
}

impl GenerationPath {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TextOnly => "text_only",
            Self::DirectEdit => "direct_edit",
            Self::VisionFallback => "vision_fallback",
        }
    }
}

/// A generated design, normalized to a data URI.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub image: DataUri,
    /// Model tag identifying the path, e.g. `gpt-4o+dall-e-3`.
    pub model: String,
    pub path: GenerationPath,
    /// The prompt the design was generated from.
    pub prompt: String,
    pub tokens: u64,
}

/// Why generation failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No provider is configured for a required step.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl GenerationError {
    /// The provider failure kind, if a provider failed.
    #[must_use]
    pub const fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            Self::Provider(e) | Self::Normalize(NormalizeError::Fetch(e)) => Some(e.kind),
            Self::NotConfigured(_) | Self::Normalize(NormalizeError::InvalidDataUri(_)) => None,
        }
    }
}

/// An image produced by some path, before normalization.
struct Produced {
    image: ProviderImage,
    model: String,
    path: GenerationPath,
    prompt: String,
    tokens: u64,
}

enum Stage {
    NoImage,
    WithImages,
    EditAttempt {
        attachments: Vec<DataUri>,
        prompt: String,
    },
    FallbackAnalysis {
        attachments: Vec<DataUri>,
        prompt: String,
        edit_error: GenerationError,
    },
    Done(Produced),
    Failed(GenerationError),
}

/// Chooses and sequences image providers for a generation request.
#[derive(Clone)]
pub struct GeneratorStrategy {
    text_to_image: Option<Arc<dyn TextToImage>>,
    editor: Option<Arc<dyn ImageEditor>>,
    describer: Option<Arc<dyn VisionDescriber>>,
    fallback_generator: Option<Arc<dyn TextToImage>>,
    normalizer: ResponseNormalizer,
}

impl std::fmt::Debug for GeneratorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorStrategy")
            .field(
                "text_to_image",
                &self.text_to_image.as_ref().map(|p| p.image_model()),
            )
            .field("editor", &self.editor.as_ref().map(|p| p.edit_model()))
            .field("describer", &self.describer.as_ref().map(|p| p.vision_model()))
            .field(
                "fallback_generator",
                &self.fallback_generator.as_ref().map(|p| p.image_model()),
            )
            .finish_non_exhaustive()
    }
}

impl GeneratorStrategy {
    /// A strategy with no providers; every request fails until some are added.
    #[must_use]
    pub const fn new(normalizer: ResponseNormalizer) -> Self {
        Self {
            text_to_image: None,
            editor: None,
            describer: None,
            fallback_generator: None,
            normalizer,
        }
    }

    /// Generator used when no reference image is supplied.
    #[must_use]
    pub fn with_text_to_image(mut self, provider: Arc<dyn TextToImage>) -> Self {
        self.text_to_image = Some(provider);
        self
    }

    /// Direct image editor tried first when references are supplied.
    #[must_use]
    pub fn with_editor(mut self, editor: Arc<dyn ImageEditor>) -> Self {
        self.editor = Some(editor);
        self
    }

    /// Describe-then-regenerate path used when the direct edit fails.
    #[must_use]
    pub fn with_vision_fallback(
        mut self,
        describer: Arc<dyn VisionDescriber>,
        generator: Arc<dyn TextToImage>,
    ) -> Self {
        self.describer = Some(describer);
        self.fallback_generator = Some(generator);
        self
    }

    /// The normalizer used for provider output.
    #[must_use]
    pub const fn normalizer(&self) -> &ResponseNormalizer {
        &self.normalizer
    }

    /// Generate one design for a validated request.
    ///
    /// # Errors
    ///
    /// Returns an error when every applicable path fails or when the result
    /// cannot be normalized. With references, the error is the fallback's
    /// unless the fallback is not configured, in which case it is the edit's.
    #[instrument(
        skip(self, input),
        fields(references = input.references.len(), sprites = input.sprite_images.len())
    )]
    pub async fn generate(
        &self,
        input: &GenerationInput,
    ) -> Result<GenerationOutcome, GenerationError> {
        let mut stage = if input.references.is_empty() {
            Stage::NoImage
        } else {
            Stage::WithImages
        };

        loop {
            stage = match stage {
                Stage::NoImage => match self.text_only(&input.prompt).await {
                    Ok(produced) => Stage::Done(produced),
                    Err(e) => Stage::Failed(e),
                },
                Stage::WithImages => {
                    let mut prompt = input.prompt.clone();
                    if let Some(clause) = &input.sprite_clause {
                        prompt.push_str(clause);
                    }
                    let mut attachments = input.references.clone();
                    attachments.extend(input.sprite_images.iter().cloned());
                    Stage::EditAttempt {
                        attachments,
                        prompt,
                    }
                }
                Stage::EditAttempt {
                    attachments,
                    prompt,
                } => {
                    let instruction =
                        PromptAssembler::reference_instruction(&prompt, input.references.len());
                    match self.direct_edit(&instruction, &attachments, &prompt).await {
                        Ok(produced) => Stage::Done(produced),
                        Err(edit_error) => {
                            warn!(error = %edit_error, "Direct edit failed, trying vision fallback");
                            Stage::FallbackAnalysis {
                                attachments,
                                prompt,
                                edit_error,
                            }
                        }
                    }
                }
                Stage::FallbackAnalysis {
                    attachments,
                    prompt,
                    edit_error,
                } => {
                    match self
                        .vision_fallback(&attachments, input.references.len(), prompt)
                        .await
                    {
                        Ok(produced) => Stage::Done(produced),
                        Err(GenerationError::NotConfigured(_)) => Stage::Failed(edit_error),
                        Err(e) => Stage::Failed(e),
                    }
                }
                Stage::Done(produced) => {
                    info!(
                        path = produced.path.as_str(),
                        model = %produced.model,
                        tokens = produced.tokens,
                        "Design generated"
                    );
                    let image = self.normalizer.to_data_uri(produced.image).await?;
                    return Ok(GenerationOutcome {
                        image,
                        model: produced.model,
                        path: produced.path,
                        prompt: produced.prompt,
                        tokens: produced.tokens,
                    });
                }
                Stage::Failed(e) => return Err(e),
            };
        }
    }

    async fn text_only(&self, prompt: &str) -> Result<Produced, GenerationError> {
        let provider = self
            .text_to_image
            .as_ref()
            .ok_or(GenerationError::NotConfigured("Text-to-image generation"))?;

        let image = provider
            .generate(&PromptAssembler::print_ready_prompt(prompt))
            .await?;

        Ok(Produced {
            image,
            model: provider.image_model().to_string(),
            path: GenerationPath::TextOnly,
            prompt: prompt.to_string(),
            tokens: 1,
        })
    }

    async fn direct_edit(
        &self,
        instruction: &str,
        attachments: &[DataUri],
        prompt: &str,
    ) -> Result<Produced, GenerationError> {
        let editor = self
            .editor
            .as_ref()
            .ok_or(GenerationError::NotConfigured("Image editing"))?;

        let edited = editor
            .edit(EditRequest {
                instruction,
                images: attachments,
            })
            .await?;

        Ok(Produced {
            image: edited.image,
            model: editor.edit_model().to_string(),
            path: GenerationPath::DirectEdit,
            prompt: prompt.to_string(),
            tokens: edited.tokens.unwrap_or(0),
        })
    }

    /// Describe the references and sprites together, with the sprite
    /// extraction text in the brief, then generate from the description.
    async fn vision_fallback(
        &self,
        attachments: &[DataUri],
        reference_count: usize,
        prompt: String,
    ) -> Result<Produced, GenerationError> {
        let (Some(describer), Some(generator)) = (&self.describer, &self.fallback_generator) else {
            return Err(GenerationError::NotConfigured("Vision fallback"));
        };

        let brief = PromptAssembler::vision_brief(&prompt, reference_count);
        let description = describer.describe(attachments, &brief).await?;
        let synthesized = truncate_chars(&description.text, MAX_FALLBACK_PROMPT_CHARS);

        let image = generator.generate(synthesized).await?;

        Ok(Produced {
            image,
            model: format!("{}+{}", describer.vision_model(), generator.image_model()),
            path: GenerationPath::VisionFallback,
            prompt,
            tokens: description.tokens.unwrap_or(0) + 1,
        })
    }
}

/// Cut `s` to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(idx, _)| &s[..idx])
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::providers::{Description, EditedImage, FetchedImage, ImageFetcher};

    const PNG_B64: &str = "iVBORw0KGgo=";

    struct NoFetch;

    #[async_trait]
    impl ImageFetcher for NoFetch {
        async fn fetch(&self, url: &str) -> Result<FetchedImage, ProviderError> {
            Ok(FetchedImage {
                bytes: url.as_bytes().to_vec(),
                content_type: Some("image/png".to_string()),
            })
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        model: &'static str,
        prompts: Mutex<Vec<String>>,
        fail: Option<ProviderErrorKind>,
    }

    #[async_trait]
    impl TextToImage for RecordingGenerator {
        fn image_model(&self) -> &'static str {
            self.model
        }

        async fn generate(&self, prompt: &str) -> Result<ProviderImage, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.fail {
                Some(kind) => Err(ProviderError::new("stub", kind, "generator failed")),
                None => Ok(ProviderImage::Url("https://x/img.png".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct StubEditor {
        fail: Option<ProviderErrorKind>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl ImageEditor for StubEditor {
        fn edit_model(&self) -> &'static str {
            "gemini-2.5-flash-image"
        }

        async fn edit(&self, request: EditRequest<'_>) -> Result<EditedImage, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.instruction.to_string(), request.images.len()));
            match self.fail {
                Some(kind) => Err(ProviderError::new("gemini", kind, "edit failed")),
                None => Ok(EditedImage {
                    image: ProviderImage::Inline(
                        DataUri::from_base64("image/png", PNG_B64).unwrap(),
                    ),
                    tokens: Some(1290),
                }),
            }
        }
    }

    #[derive(Default)]
    struct StubDescriber {
        seen: Mutex<Vec<(usize, String)>>,
    }

    #[async_trait]
    impl VisionDescriber for StubDescriber {
        fn vision_model(&self) -> &'static str {
            "gpt-4o"
        }

        async fn describe(
            &self,
            images: &[DataUri],
            brief: &str,
        ) -> Result<Description, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((images.len(), brief.to_string()));
            Ok(Description {
                text: "A round yellow sun with a wide smile".to_string(),
                tokens: Some(800),
            })
        }
    }

    fn input(references: usize) -> GenerationInput {
        GenerationInput {
            prompt: "make it blue".to_string(),
            references: (0..references)
                .map(|_| DataUri::from_base64("image/png", PNG_B64).unwrap())
                .collect(),
            sprite_images: Vec::new(),
            sprite_clause: None,
            creator_id: None,
        }
    }

    fn normalizer() -> ResponseNormalizer {
        ResponseNormalizer::new(Arc::new(NoFetch))
    }

    #[tokio::test]
    async fn test_no_image_uses_text_to_image_with_print_ready_prompt() {
        let sdxl = Arc::new(RecordingGenerator {
            model: "sdxl+remove-bg",
            ..Default::default()
        });
        let strategy = GeneratorStrategy::new(normalizer()).with_text_to_image(sdxl.clone());

        let outcome = strategy.generate(&input(0)).await.unwrap();

        assert_eq!(outcome.path, GenerationPath::TextOnly);
        assert_eq!(outcome.model, "sdxl+remove-bg");
        assert_eq!(outcome.tokens, 1);
        assert_eq!(outcome.prompt, "make it blue");
        assert!(outcome.image.to_string().starts_with("data:image/png;base64,"));

        let prompts = sdxl.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("make it blue, isolated subject"));
    }

    #[tokio::test]
    async fn test_direct_edit_success() {
        let editor = Arc::new(StubEditor::default());
        let strategy = GeneratorStrategy::new(normalizer()).with_editor(editor.clone());

        let outcome = strategy.generate(&input(2)).await.unwrap();

        assert_eq!(outcome.path, GenerationPath::DirectEdit);
        assert_eq!(outcome.model, "gemini-2.5-flash-image");
        assert_eq!(outcome.tokens, 1290);

        let seen = editor.seen.lock().unwrap();
        assert_eq!(seen[0].1, 2);
        assert!(
            seen[0]
                .0
                .starts_with("Based on these 2 reference images (first image, second image),")
        );
    }

    #[tokio::test]
    async fn test_edit_failure_falls_back_to_vision() {
        let dalle = Arc::new(RecordingGenerator {
            model: "dall-e-3",
            ..Default::default()
        });
        let strategy = GeneratorStrategy::new(normalizer())
            .with_editor(Arc::new(StubEditor {
                fail: Some(ProviderErrorKind::InvalidInput),
                ..Default::default()
            }))
            .with_vision_fallback(Arc::new(StubDescriber::default()), dalle.clone());

        let outcome = strategy.generate(&input(1)).await.unwrap();

        assert_eq!(outcome.path, GenerationPath::VisionFallback);
        assert_eq!(outcome.model, "gpt-4o+dall-e-3");
        assert_eq!(outcome.tokens, 801);
        assert_eq!(
            dalle.prompts.lock().unwrap().as_slice(),
            ["A round yellow sun with a wide smile"]
        );
    }

    #[tokio::test]
    async fn test_fallback_without_editor() {
        let strategy = GeneratorStrategy::new(normalizer()).with_vision_fallback(
            Arc::new(StubDescriber::default()),
            Arc::new(RecordingGenerator {
                model: "dall-e-3",
                ..Default::default()
            }),
        );

        let outcome = strategy.generate(&input(1)).await.unwrap();
        assert_eq!(outcome.path, GenerationPath::VisionFallback);
    }

    #[tokio::test]
    async fn test_edit_error_returned_when_no_fallback() {
        let strategy = GeneratorStrategy::new(normalizer()).with_editor(Arc::new(StubEditor {
            fail: Some(ProviderErrorKind::ContentPolicy),
            ..Default::default()
        }));

        let err = strategy.generate(&input(1)).await.unwrap_err();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::ContentPolicy));
    }

    #[tokio::test]
    async fn test_fallback_error_returned_when_both_fail() {
        let strategy = GeneratorStrategy::new(normalizer())
            .with_editor(Arc::new(StubEditor {
                fail: Some(ProviderErrorKind::InvalidInput),
                ..Default::default()
            }))
            .with_vision_fallback(
                Arc::new(StubDescriber::default()),
                Arc::new(RecordingGenerator {
                    model: "dall-e-3",
                    fail: Some(ProviderErrorKind::Upstream),
                    ..Default::default()
                }),
            );

        let err = strategy.generate(&input(1)).await.unwrap_err();
        assert_eq!(err.provider_kind(), Some(ProviderErrorKind::Upstream));
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let strategy = GeneratorStrategy::new(normalizer());
        let err = strategy.generate(&input(0)).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured(_)));
    }

    const SPRITE_CLAUSE: &str = " Extract the following elements from the attached sprite images and incorporate them into the final design: 1) the red hat.";

    fn input_with_sprite() -> GenerationInput {
        let mut request = input(1);
        request.sprite_images = vec![DataUri::from_base64("image/png", PNG_B64).unwrap()];
        request.sprite_clause = Some(SPRITE_CLAUSE.to_string());
        request
    }

    #[tokio::test]
    async fn test_sprites_attached_after_references() {
        let editor = Arc::new(StubEditor::default());
        let strategy = GeneratorStrategy::new(normalizer()).with_editor(editor.clone());

        let outcome = strategy.generate(&input_with_sprite()).await.unwrap();
        assert!(outcome.prompt.ends_with("1) the red hat."));

        let seen = editor.seen.lock().unwrap();
        assert_eq!(seen[0].1, 2);
        assert!(seen[0].0.starts_with("Based on this reference image, make it blue Extract"));
    }

    #[tokio::test]
    async fn test_fallback_keeps_sprites_and_extraction_text() {
        let describer = Arc::new(StubDescriber::default());
        let strategy = GeneratorStrategy::new(normalizer())
            .with_editor(Arc::new(StubEditor {
                fail: Some(ProviderErrorKind::Upstream),
                ..Default::default()
            }))
            .with_vision_fallback(
                describer.clone(),
                Arc::new(RecordingGenerator {
                    model: "dall-e-3",
                    ..Default::default()
                }),
            );

        let outcome = strategy.generate(&input_with_sprite()).await.unwrap();
        assert_eq!(outcome.path, GenerationPath::VisionFallback);
        assert!(outcome.prompt.ends_with(SPRITE_CLAUSE));

        let seen = describer.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 2);
        assert!(seen[0].1.contains("1) the red hat."));
        assert!(seen[0].1.contains("the attached reference image"));
    }

    #[test]
    fn test_truncate_chars() {
        let long = "a".repeat(MAX_FALLBACK_PROMPT_CHARS + 10);
        assert_eq!(
            truncate_chars(&long, MAX_FALLBACK_PROMPT_CHARS).len(),
            MAX_FALLBACK_PROMPT_CHARS
        );
    }
}
