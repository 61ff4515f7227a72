//! `PostgreSQL` usage store.

use async_trait::async_trait;
use sqlx::PgPool;
use tshirt_studio_core::{CreatorId, UsageMonth};

use crate::services::usage::{UsageError, UsageRecord, UsageStore};

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    creator_id: CreatorId,
    monthly_limit: Option<i64>,
    monthly_used: i64,
    total_used: i64,
    image_generation_used: i64,
    usage_month: String,
}

impl From<UsageRow> for UsageRecord {
    fn from(row: UsageRow) -> Self {
        Self {
            creator_id: row.creator_id,
            monthly_limit: row.monthly_limit,
            monthly_used: row.monthly_used,
            total_used: row.total_used,
            image_generation_used: row.image_generation_used,
            usage_month: UsageMonth::from_stored(row.usage_month),
        }
    }
}

/// Usage counters in the `creator_usage` table.
#[derive(Debug, Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Set or clear a creator's monthly limit, creating the record if needed.
    ///
    /// # Errors
    ///
    /// Returns `UsageError::Database` if the query fails.
    pub async fn set_limit(
        &self,
        creator: &CreatorId,
        limit: Option<i64>,
    ) -> Result<UsageRecord, UsageError> {
        let row = sqlx::query_as::<_, UsageRow>(
            r"
            INSERT INTO creator_usage (creator_id, monthly_limit, usage_month)
            VALUES ($1, $2, $3)
            ON CONFLICT (creator_id) DO UPDATE SET
                monthly_limit = EXCLUDED.monthly_limit,
                updated_at = now()
            RETURNING creator_id, monthly_limit, monthly_used, total_used,
                      image_generation_used, usage_month
            ",
        )
        .bind(creator)
        .bind(limit)
        .bind(UsageMonth::current().as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn load(&self, creator: &CreatorId) -> Result<Option<UsageRecord>, UsageError> {
        let row = sqlx::query_as::<_, UsageRow>(
            r"
            SELECT creator_id, monthly_limit, monthly_used, total_used,
                   image_generation_used, usage_month
            FROM creator_usage
            WHERE creator_id = $1
            ",
        )
        .bind(creator)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn record(
        &self,
        creator: &CreatorId,
        month: &UsageMonth,
        tokens: i64,
    ) -> Result<(), UsageError> {
        // Single statement so concurrent increments never lose an update.
        sqlx::query(
            r"
            INSERT INTO creator_usage
                (creator_id, monthly_used, total_used, image_generation_used, usage_month)
            VALUES ($1, $3, $3, $3, $2)
            ON CONFLICT (creator_id) DO UPDATE SET
                monthly_used = CASE
                    WHEN creator_usage.usage_month = EXCLUDED.usage_month
                        THEN creator_usage.monthly_used + EXCLUDED.monthly_used
                    ELSE EXCLUDED.monthly_used
                END,
                total_used = creator_usage.total_used + EXCLUDED.total_used,
                image_generation_used =
                    creator_usage.image_generation_used + EXCLUDED.image_generation_used,
                usage_month = EXCLUDED.usage_month,
                updated_at = now()
            ",
        )
        .bind(creator)
        .bind(month.as_str())
        .bind(tokens)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), UsageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
