//! Core types for Tshirt Studio.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod data_uri;
pub mod id;
pub mod usage;

pub use data_uri::{DataUri, DataUriError};
pub use id::*;
pub use usage::UsageMonth;
