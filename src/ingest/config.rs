//! Ingestion configuration constants and backoff calculation

use std::path::PathBuf;
use std::time::Duration;

/// Earliest date any dataset falls back to when nothing has been persisted.
pub const EARLIEST_DATE: &str = "20080101";

/// Default provider quota.
/// The entry-level Tushare account documents 400 calls per minute but is
/// downgraded to 200 under sustained load, so 200 is the safe default.
pub const DEFAULT_CALLS_PER_MINUTE: u32 = 200;

/// Default number of attempts per provider call (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base backoff; attempt `i` waits `2^i * base`.
/// 30 seconds outlasts the provider's one-minute quota window after two retries.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(30);

/// Default database file.
pub const DEFAULT_DB_PATH: &str = "data/refdata.sqlite";

/// Default snapshot directory.
pub const DEFAULT_SNAPSHOT_DIR: &str = "data/snapshots";

/// Fixed-width date format used by every dataset.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Calculate the exponential backoff delay after the failure of attempt `attempt` (0-based)
pub fn calculate_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Retry budget for provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, first try included
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after attempt `attempt` (0-based) failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(self.base_backoff, attempt)
    }
}

/// Runtime configuration handed to the executor
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Provider quota used to derive the throttle interval
    pub calls_per_minute: u32,
    /// Retry budget
    pub retry: RetryPolicy,
    /// Fallback start date for incremental datasets
    pub earliest_date: String,
    /// Where CSV snapshots go; `None` disables snapshots
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            calls_per_minute: DEFAULT_CALLS_PER_MINUTE,
            retry: RetryPolicy::default(),
            earliest_date: EARLIEST_DATE.to_string(),
            snapshot_dir: None,
        }
    }
}

/// Check that a string is a valid `YYYYMMDD` date
pub fn validate_date(value: &str) -> Result<(), String> {
    if value.len() != 8 {
        return Err(format!("'{value}' is not an 8-digit YYYYMMDD date"));
    }
    chrono::NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|_| ())
        .map_err(|e| format!("'{value}' is not a valid YYYYMMDD date: {e}"))
}
