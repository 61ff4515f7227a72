//! CLI command implementations.

pub mod migrate;
pub mod usage;

use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by commands that talk to the API database.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Usage store error.
    #[error(transparent)]
    Usage(#[from] tshirt_studio_api::services::UsageError),

    /// Invalid creator ID.
    #[error("Invalid creator ID: {0}")]
    InvalidCreatorId(#[from] tshirt_studio_core::IdError),
}

/// Read `DATABASE_URL`, loading `.env` first.
pub fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))
}
