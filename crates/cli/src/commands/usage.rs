//! Creator usage commands.
//!
//! # Usage
//!
//! ```bash
//! ts-cli usage show u_123
//! ts-cli usage set-limit u_123 50000
//! ts-cli usage set-limit u_123 unlimited
//! ```

use std::fmt;
use std::str::FromStr;

use tshirt_studio_api::db::{self, PgUsageStore};
use tshirt_studio_api::services::{UsageRecord, UsageStore};
use tshirt_studio_core::{CreatorId, UsageMonth};

use super::{CommandError, database_url};

/// A monthly token limit given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyLimit {
    Tokens(i64),
    Unlimited,
}

impl MonthlyLimit {
    const fn as_option(self) -> Option<i64> {
        match self {
            Self::Tokens(n) => Some(n),
            Self::Unlimited => None,
        }
    }
}

impl FromStr for MonthlyLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::Unlimited);
        }
        match s.parse::<i64>() {
            Ok(n) if n >= 0 => Ok(Self::Tokens(n)),
            _ => Err(format!(
                "expected a non-negative token count or \"unlimited\", got {s:?}"
            )),
        }
    }
}

impl fmt::Display for MonthlyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tokens(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

async fn store() -> Result<PgUsageStore, CommandError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to API database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgUsageStore::new(pool))
}

fn describe(record: &UsageRecord) -> String {
    let month = UsageMonth::current();
    let limit = record
        .monthly_limit
        .map_or(MonthlyLimit::Unlimited, MonthlyLimit::Tokens);
    format!(
        "creator:            {}\n\
         month:              {}\n\
         used this month:    {}\n\
         monthly limit:      {limit}\n\
         total used:         {}\n\
         image generations:  {}",
        record.creator_id,
        month.as_str(),
        record.used_in(&month),
        record.total_used,
        record.image_generation_used,
    )
}

/// Print a creator's usage counters.
pub async fn show(creator_id: &str) -> Result<(), CommandError> {
    let creator = CreatorId::parse(creator_id)?;
    let store = store().await?;

    let record = store.load(&creator).await?;

    #[allow(clippy::print_stdout)]
    {
        match record {
            Some(record) => println!("{}", describe(&record)),
            None => println!("No usage recorded for {creator}"),
        }
    }
    Ok(())
}

/// Set or clear a creator's monthly limit.
pub async fn set_limit(creator_id: &str, limit: MonthlyLimit) -> Result<(), CommandError> {
    let creator = CreatorId::parse(creator_id)?;
    let store = store().await?;

    let record = store.set_limit(&creator, limit.as_option()).await?;
    tracing::info!(creator = %creator, %limit, "Monthly limit updated");

    #[allow(clippy::print_stdout)]
    {
        println!("{}", describe(&record));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!("5000".parse(), Ok(MonthlyLimit::Tokens(5000)));
        assert_eq!("0".parse(), Ok(MonthlyLimit::Tokens(0)));
        assert_eq!("Unlimited".parse(), Ok(MonthlyLimit::Unlimited));
        assert!("-1".parse::<MonthlyLimit>().is_err());
        assert!("lots".parse::<MonthlyLimit>().is_err());
    }

    #[test]
    fn test_limit_as_option() {
        assert_eq!(MonthlyLimit::Tokens(10).as_option(), Some(10));
        assert_eq!(MonthlyLimit::Unlimited.as_option(), None);
    }

    #[test]
    fn test_describe_resets_stale_month() {
        let record = UsageRecord {
            creator_id: CreatorId::parse("u_1").unwrap(),
            monthly_limit: Some(1000),
            monthly_used: 400,
            total_used: 900,
            image_generation_used: 900,
            usage_month: UsageMonth::from_stored("2000-01"),
        };
        let text = describe(&record);
        assert!(text.contains("used this month:    0"));
        assert!(text.contains("monthly limit:      1000"));
        assert!(text.contains("total used:         900"));
    }
}
