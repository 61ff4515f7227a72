//! Usage metering period.

use core::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A calendar month stamp in `YYYY-MM` form.
///
/// Creator usage counters reset whenever the stored stamp differs from the
/// current one, so equality on the string form is the whole contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageMonth(String);

impl UsageMonth {
    /// The month containing `at`.
    #[must_use]
    pub fn of(at: DateTime<Utc>) -> Self {
        Self(format!("{:04}-{:02}", at.year(), at.month()))
    }

    /// The current UTC month.
    #[must_use]
    pub fn current() -> Self {
        Self::of(Utc::now())
    }

    /// Wrap a stored stamp without validation.
    ///
    /// Stored values that are not well-formed simply never equal the current
    /// month, which resets the counter.
    #[must_use]
    pub fn from_stored(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The `YYYY-MM` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UsageMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
