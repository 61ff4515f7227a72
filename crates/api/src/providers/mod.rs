//! Image and vision provider abstraction.
//!
//! Each capability the generation strategy needs is a trait. Concrete vendor
//! clients implement one or more of them, and the strategy only ever holds
//! `Arc<dyn Trait>` values handed to it at startup, so tests can substitute
//! any provider.
//!
//! | trait | production implementation |
//! |-------|---------------------------|
//! | [`TextToImage`] | [`OpenAiClient`] (DALL-E 3), [`ReplicateClient`] (SDXL + background removal) |
//! | [`ImageEditor`] | [`GeminiClient`] |
//! | [`VisionDescriber`] | [`OpenAiClient`] (GPT-4o) |
//! | [`ImageFetcher`] | [`HttpImageFetcher`] |

mod error;
mod fetch;
mod gemini;
mod openai;
mod replicate;

use async_trait::async_trait;
use tshirt_studio_core::DataUri;

pub use error::{ProviderError, ProviderErrorKind};
pub use fetch::HttpImageFetcher;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use replicate::ReplicateClient;

/// An image as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderImage {
    /// A remote URL the image can be fetched from.
    Url(String),
    /// Image bytes embedded in the response.
    Inline(DataUri),
}

/// Input to a direct image edit.
#[derive(Debug, Clone, Copy)]
pub struct EditRequest<'a> {
    /// Instruction text describing the desired result.
    pub instruction: &'a str,
    /// Images to edit, references first, then sprites.
    pub images: &'a [DataUri],
}

/// Result of a direct image edit.
#[derive(Debug, Clone)]
pub struct EditedImage {
    pub image: ProviderImage,
    /// Tokens reported by the vendor, if any.
    pub tokens: Option<u64>,
}

/// Result of a vision analysis.
#[derive(Debug, Clone)]
pub struct Description {
    pub text: String,
    /// Tokens reported by the vendor, if any.
    pub tokens: Option<u64>,
}

/// A fetched remote image.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// The `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
}

/// Generates an image from text alone.
#[async_trait]
pub trait TextToImage: Send + Sync {
    /// Model identifier reported as `modelUsed`.
    fn image_model(&self) -> &'static str;

    /// Generate one image for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<ProviderImage, ProviderError>;
}

/// Edits one or more images according to an instruction.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Model identifier reported as `modelUsed`.
    fn edit_model(&self) -> &'static str;

    /// Produce a new image from the inputs and the instruction.
    async fn edit(&self, request: EditRequest<'_>) -> Result<EditedImage, ProviderError>;
}

/// Describes images in text.
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    /// Model identifier, combined with the generator's in `modelUsed`.
    fn vision_model(&self) -> &'static str;

    /// Describe `images` following `brief`.
    async fn describe(
        &self,
        images: &[DataUri],
        brief: &str,
    ) -> Result<Description, ProviderError>;
}

/// Downloads an image by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ProviderError>;
}

/// Map a failed vendor response to a `ProviderError`, reading the body for detail.
pub(crate) async fn error_from_response(
    provider: &'static str,
    response: reqwest::Response,
    classify: fn(u16, &str) -> ProviderErrorKind,
) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let kind = classify(status, &body);
    ProviderError::http(provider, kind, status, body)
}
