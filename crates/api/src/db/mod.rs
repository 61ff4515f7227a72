//! Database operations for the API `PostgreSQL` database.
//!
//! The database is optional. Without `DATABASE_URL` the service runs with
//! usage metering disabled.
//!
//! ## Tables
//!
//! - `creator_usage` - Per-creator monthly token limits and counters
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p tshirt-studio-cli -- migrate
//! ```

mod usage;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use usage::PgUsageStore;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
