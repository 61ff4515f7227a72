//! Per-creator monthly usage metering.
//!
//! Metering is advisory: a store failure never fails a generation request.
//! The limit check happens before generation and the increment after, so two
//! concurrent requests from one creator can both pass the check. That window
//! is accepted because the token cost is only known once generation is done.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use tshirt_studio_core::{CreatorId, UsageMonth};

/// Errors from a usage store.
#[derive(Debug, Error)]
pub enum UsageError {
    /// Failure reported by a [`UsageStore`] that is not backed by `PostgreSQL`.
    #[error("usage store error: {0}")]
    Store(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A creator's stored usage counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub creator_id: CreatorId,
    /// `None` means unlimited.
    pub monthly_limit: Option<i64>,
    pub monthly_used: i64,
    pub total_used: i64,
    pub image_generation_used: i64,
    /// Month the `monthly_used` counter belongs to.
    pub usage_month: UsageMonth,
}

impl UsageRecord {
    /// Tokens used in `month`; zero when the stored counter is from another month.
    #[must_use]
    pub fn used_in(&self, month: &UsageMonth) -> i64 {
        if &self.usage_month == month {
            self.monthly_used
        } else {
            0
        }
    }
}

/// Persistent storage for usage counters.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Load a creator's record, if one exists.
    async fn load(&self, creator: &CreatorId) -> Result<Option<UsageRecord>, UsageError>;

    /// Atomically add `tokens` to the creator's counters for `month`,
    /// resetting the monthly counter when the stored month differs.
    async fn record(
        &self,
        creator: &CreatorId,
        month: &UsageMonth,
        tokens: i64,
    ) -> Result<(), UsageError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), UsageError>;
}

/// Result of a pre-generation limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheck {
    Allowed,
    Exceeded { limit: i64, used: i64 },
}

/// Enforces monthly limits on top of a [`UsageStore`].
#[derive(Clone)]
pub struct UsageMeter {
    store: Arc<dyn UsageStore>,
}

impl std::fmt::Debug for UsageMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageMeter").finish_non_exhaustive()
    }
}

impl UsageMeter {
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    /// Check whether the creator may generate this month.
    ///
    /// Store errors are logged and treated as allowed.
    #[instrument(skip(self, creator), fields(creator = %creator))]
    pub async fn check(&self, creator: &CreatorId) -> QuotaCheck {
        let record = match self.store.load(creator).await {
            Ok(Some(record)) => record,
            Ok(None) => return QuotaCheck::Allowed,
            Err(e) => {
                warn!(error = %e, "Usage check failed, continuing without limit");
                return QuotaCheck::Allowed;
            }
        };

        let used = record.used_in(&UsageMonth::current());
        match record.monthly_limit {
            Some(limit) if used >= limit => QuotaCheck::Exceeded { limit, used },
            _ => QuotaCheck::Allowed,
        }
    }

    /// Add tokens to the creator's counters. Errors are logged and dropped.
    #[instrument(skip(self, creator), fields(creator = %creator))]
    pub async fn record(&self, creator: &CreatorId, tokens: u64) {
        if tokens == 0 {
            return;
        }
        let tokens = i64::try_from(tokens).unwrap_or(i64::MAX);
        match self
            .store
            .record(creator, &UsageMonth::current(), tokens)
            .await
        {
            Ok(()) => debug!(tokens, "Recorded usage"),
            Err(e) => warn!(error = %e, tokens, "Failed to record usage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory store mirroring the database upsert semantics.
    #[derive(Default)]
    struct MemoryUsageStore {
        records: Mutex<HashMap<CreatorId, UsageRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl UsageStore for MemoryUsageStore {
        async fn load(&self, creator: &CreatorId) -> Result<Option<UsageRecord>, UsageError> {
            if self.fail {
                return Err(UsageError::Store("offline".to_string()));
            }
            Ok(self.records.lock().unwrap().get(creator).cloned())
        }

        async fn record(
            &self,
            creator: &CreatorId,
            month: &UsageMonth,
            tokens: i64,
        ) -> Result<(), UsageError> {
            if self.fail {
                return Err(UsageError::Store("offline".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let record = records
                .entry(creator.clone())
                .or_insert_with(|| UsageRecord {
                    creator_id: creator.clone(),
                    monthly_limit: None,
                    monthly_used: 0,
                    total_used: 0,
                    image_generation_used: 0,
                    usage_month: month.clone(),
                });
            if &record.usage_month != month {
                record.usage_month = month.clone();
                record.monthly_used = 0;
            }
            record.monthly_used += tokens;
            record.total_used += tokens;
            record.image_generation_used += tokens;
            Ok(())
        }

        async fn ping(&self) -> Result<(), UsageError> {
            if self.fail {
                return Err(UsageError::Store("offline".to_string()));
            }
            Ok(())
        }
    }

    fn creator() -> CreatorId {
        CreatorId::parse("creator-1").unwrap()
    }

    fn record(limit: Option<i64>, used: i64, month: UsageMonth) -> UsageRecord {
        UsageRecord {
            creator_id: creator(),
            monthly_limit: limit,
            monthly_used: used,
            total_used: used,
            image_generation_used: used,
            usage_month: month,
        }
    }

    #[tokio::test]
    async fn test_unknown_creator_allowed() {
        let meter = UsageMeter::new(Arc::new(MemoryUsageStore::default()));
        assert_eq!(meter.check(&creator()).await, QuotaCheck::Allowed);
    }

    #[tokio::test]
    async fn test_limit_reached() {
        let store = MemoryUsageStore::default();
        store.records.lock().unwrap().insert(
            creator(),
            record(Some(1000), 1000, UsageMonth::current()),
        );
        let meter = UsageMeter::new(Arc::new(store));

        assert_eq!(
            meter.check(&creator()).await,
            QuotaCheck::Exceeded {
                limit: 1000,
                used: 1000
            }
        );
    }

    #[tokio::test]
    async fn test_previous_month_usage_resets() {
        let store = MemoryUsageStore::default();
        store.records.lock().unwrap().insert(
            creator(),
            record(Some(1000), 5000, UsageMonth::from_stored("1999-01")),
        );
        let meter = UsageMeter::new(Arc::new(store));
        assert_eq!(meter.check(&creator()).await, QuotaCheck::Allowed);
    }

    #[tokio::test]
    async fn test_no_limit_is_unlimited() {
        let store = MemoryUsageStore::default();
        store
            .records
            .lock()
            .unwrap()
            .insert(creator(), record(None, 10_000_000, UsageMonth::current()));
        let meter = UsageMeter::new(Arc::new(store));
        assert_eq!(meter.check(&creator()).await, QuotaCheck::Allowed);
    }

    #[tokio::test]
    async fn test_store_failure_is_non_fatal() {
        let meter = UsageMeter::new(Arc::new(MemoryUsageStore {
            fail: true,
            ..Default::default()
        }));
        assert_eq!(meter.check(&creator()).await, QuotaCheck::Allowed);
        meter.record(&creator(), 10).await;
    }

    #[tokio::test]
    async fn test_record_accumulates() {
        let store = Arc::new(MemoryUsageStore::default());
        let meter = UsageMeter::new(store.clone());

        meter.record(&creator(), 1290).await;
        meter.record(&creator(), 1).await;
        meter.record(&creator(), 0).await;

        let records = store.records.lock().unwrap();
        let record = &records[&creator()];
        assert_eq!(record.monthly_used, 1291);
        assert_eq!(record.total_used, 1291);
        assert_eq!(record.usage_month, UsageMonth::current());
    }
}
