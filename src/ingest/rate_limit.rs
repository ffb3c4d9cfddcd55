//! Call throttling
//!
//! The provider enforces a calls-per-minute quota. [`CallThrottler`] spaces
//! releases at least `interval` apart, across every task that shares it.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use crate::metrics::record_throttle_wait;

/// Minimum-interval gate in front of the provider
#[derive(Debug)]
pub struct CallThrottler {
    interval: Duration,
    last_permitted: Mutex<Option<Instant>>,
}

impl CallThrottler {
    /// Create a throttler that releases at most one caller per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_permitted: Mutex::new(None),
        }
    }

    /// Create a throttler from a calls-per-minute quota
    ///
    /// # Errors
    /// Returns an error for a quota of zero
    pub fn from_calls_per_minute(calls_per_minute: u32) -> Result<Self, ThrottleError> {
        if calls_per_minute == 0 {
            return Err(ThrottleError::InvalidQuota);
        }
        Ok(Self::new(Duration::from_secs(60) / calls_per_minute))
    }

    /// Minimum spacing between releases
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until at least `interval` has passed since the previous release
    ///
    /// The lock is held across the wait, so concurrent callers queue up and
    /// are released one interval apart in arrival order.
    ///
    /// # Returns
    /// How long this caller waited for its slot
    pub async fn wait_for_slot(&self) -> Duration {
        let entered = Instant::now();
        let mut last = self.last_permitted.lock().await;
        let queued_at = Instant::now();

        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > queued_at {
                trace!(wait_ms = (ready_at - queued_at).as_millis() as u64, "Throttling provider call");
                sleep_until(ready_at).await;
            }
        }

        let released = Instant::now();
        *last = Some(released);
        drop(last);

        let waited = released - entered;
        record_throttle_wait(waited);
        waited
    }
}

/// Throttler configuration errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThrottleError {
    /// A quota of zero calls per minute
    #[error("calls per minute must be at least 1")]
    InvalidQuota,
}
