//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! ts-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string for the API database
//!
//! # Migration Files
//!
//! API migrations live in `crates/api/migrations/` and are embedded at
//! compile time.

use super::{CommandError, database_url};

/// Run API database migrations.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to API database...");
    let pool = tshirt_studio_api::db::create_pool(&database_url).await?;

    tracing::info!("Running API migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("API migrations complete!");
    Ok(())
}
