//! Provider call contract
//!
//! A provider is anything that turns an API name plus [`CallParams`] into a
//! [`RowSet`] or fails. The pipeline treats every [`ProviderError`] as
//! transient; only the retry budget decides when to give up.

use crate::{CallParams, RowSet};
use async_trait::async_trait;

pub mod retry_formatter;
pub mod tushare;

pub use retry_formatter::{FailureKind, RetryContext};

/// Provider errors, all of them retryable
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure before an HTTP status was received
    #[error("network error ({}): {message}", kind.description())]
    Network {
        /// Classified transport failure
        kind: FailureKind,
        /// Underlying error text
        message: String,
    },

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The provider answered with an application-level error code
    #[error("API error {code}: {message}")]
    Api {
        /// Provider error code
        code: i64,
        /// Provider error message
        message: String,
    },

    /// The response could not be decoded into a row set
    #[error("parse error: {0}")]
    Parse(String),

    /// Any other failure raised by a provider implementation
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Classification used in retry messages
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Network { kind, .. } => *kind,
            ProviderError::Http { status, .. } => FailureKind::from_status(*status),
            ProviderError::Api { code, .. } => FailureKind::from_api_code(*code),
            ProviderError::Parse(_) => FailureKind::InvalidResponse,
            ProviderError::Other(_) => FailureKind::Generic,
        }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A data provider reachable through named API calls
#[async_trait]
pub trait Provider: Send + Sync {
    /// Invoke one API and return its rows
    ///
    /// # Arguments
    /// * `api_name` - Provider API identifier (e.g., "trade_cal")
    /// * `params` - Call parameters
    async fn query(&self, api_name: &str, params: &CallParams) -> ProviderResult<RowSet>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}
