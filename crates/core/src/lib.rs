//! Tshirt Studio Core - Shared domain types.
//!
//! This crate provides the types used across all Tshirt Studio components:
//! - `api` - HTTP service for design generation, storage and fulfillment
//! - `cli` - Command-line tools for migrations and usage management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Prompt assembly lives here because it is a pure
//! string transform that both the service and its tests depend on.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, data URIs and usage months
//! - [`prompt`] - Style options and deterministic prompt assembly

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod prompt;
pub mod types;

pub use prompt::{PromptAssembler, SpriteReference, StyleOptions};
pub use types::*;
