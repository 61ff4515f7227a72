//! Design generation: request validation, provider orchestration and
//! response normalization.

mod normalize;
mod request;
mod strategy;

pub use normalize::{NormalizeError, ResponseNormalizer};
pub use request::{GenerationInput, GenerationRequest, MIN_PROMPT_CHARS, RequestError, validated_prompt};
pub use strategy::{
    GenerationError, GenerationOutcome, GenerationPath, GeneratorStrategy,
    MAX_FALLBACK_PROMPT_CHARS,
};
