//! Prompt construction for image generation.
//!
//! - [`StyleOptions`] - the style knobs a client may send alongside a prompt
//! - [`SpriteReference`] - sub-images whose elements should be merged into a design
//! - [`PromptAssembler`] - deterministic string assembly from the above

mod assembler;
mod options;

pub use assembler::{MAX_REFERENCE_IMAGES, PromptAssembler};
pub use options::{SpriteReference, StyleOptions};
