//! Services backing the HTTP routes.
//!
//! - [`usage`] - Per-creator monthly token metering
//! - [`blob`] - Design storage
//! - [`sprite`] - Sprite extraction subprocess

pub mod blob;
pub mod sprite;
pub mod usage;

pub use blob::{BlobError, BlobStore, StoredBlob, VercelBlobClient};
pub use sprite::{SpriteError, SpriteExtractor};
pub use usage::{QuotaCheck, UsageError, UsageMeter, UsageRecord, UsageStore};
