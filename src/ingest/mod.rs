//! Ingestion pipeline
//!
//! This module provides the generic machinery every dataset goes through:
//!
//! 1. **Watermark**: find where the dataset left off ([`crate::resume`])
//! 2. **Throttle**: wait for a provider slot via [`rate_limit::CallThrottler`]
//! 3. **Retry**: call the provider through [`retry::RetryingInvoker`], once
//!    per page when the dataset paginates
//! 4. **Persist**: write the row set and its indexes ([`crate::output`]) on
//!    the blocking pool
//!
//! [`executor::IngestExecutor`] runs those steps in order for one
//! [`crate::sources::DatasetSource`], or for a batch of them concurrently.
//!
//! # Error Handling
//!
//! Provider failures are absorbed by the retry loop until the budget is spent
//! and then surface as [`IngestError::ProviderExhausted`]. Persistence errors
//! are never retried here. In a batch, one dataset's error never stops the
//! others.

pub mod config;
pub mod executor;
pub mod job;
pub mod rate_limit;
pub mod retry;

pub use config::{IngestConfig, RetryPolicy, EARLIEST_DATE};
pub use executor::IngestExecutor;
pub use job::{CycleReport, CycleStatus};
pub use rate_limit::{CallThrottler, ThrottleError};
pub use retry::RetryingInvoker;

use crate::output::OutputError;
use crate::provider::ProviderError;
use crate::resume::WatermarkError;
use crate::CallParams;

/// Ingestion errors
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The retry budget was spent without a successful call
    #[error("provider call {call}({params}) failed after {attempts} attempts: {source}")]
    ProviderExhausted {
        /// Provider API name
        call: String,
        /// Parameters of the failed call
        params: CallParams,
        /// Attempts made
        attempts: u32,
        /// Last failure
        #[source]
        source: ProviderError,
    },

    /// Watermark could not be resolved
    #[error("watermark error: {0}")]
    Watermark(#[from] WatermarkError),

    /// Store write or snapshot failure
    #[error(transparent)]
    Output(#[from] OutputError),

    /// Pages of one fetch could not be joined
    #[error("pagination failed for {call}: {reason}")]
    Pagination {
        /// Provider API name
        call: String,
        /// What went wrong
        reason: String,
    },

    /// A blocking store task panicked or was cancelled
    #[error("store task failed: {0}")]
    Task(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Shutdown was requested before the cycle could finish
    #[error("cancelled by shutdown request")]
    Cancelled,
}

impl From<ThrottleError> for IngestError {
    fn from(err: ThrottleError) -> Self {
        IngestError::Config(err.to_string())
    }
}
