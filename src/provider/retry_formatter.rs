//! Retry message formatting for provider calls.
//!
//! Every failed attempt is logged with the call identity and its parameters.
//! [`RetryContext`] keeps those messages consistent across the retry loop,
//! its final failure summary and the success-after-retry notice.

use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Tushare answers with this code when the per-minute quota is exceeded.
const API_CODE_RATE_LIMIT: i64 = 40203;

/// Tushare answers with this code for an invalid or expired token.
const API_CODE_AUTH: i64 = 40101;

/// Classification of provider failures for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network timeout or connection stalled long enough to trigger a timeout
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// Provider quota exceeded (HTTP 429 or quota API code)
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// Authentication failures (HTTP 401/403 or token API code)
    AuthFailed,
    /// Other HTTP 4xx responses
    ClientError(u16),
    /// Application-level error code from the provider
    ApiError(i64),
    /// Response body that is not a valid row set
    InvalidResponse,
    /// Anything else
    Generic,
}

impl FailureKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthFailed,
            500..=599 => Self::ServerError(status),
            400..=499 => Self::ClientError(status),
            _ => Self::Generic,
        }
    }

    /// Classify a provider API error code
    pub fn from_api_code(code: i64) -> Self {
        match code {
            API_CODE_RATE_LIMIT => Self::RateLimit,
            API_CODE_AUTH => Self::AuthFailed,
            other => Self::ApiError(other),
        }
    }

    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::AuthFailed => "authentication failed",
            Self::ClientError(code) => match code {
                404 => "resource not found",
                _ => "client error",
            },
            Self::ApiError(_) => "provider API error",
            Self::InvalidResponse => "invalid response",
            Self::Generic => "provider call failed",
        }
    }

    /// Suggested remediation shown once the retry budget is spent.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Lower --calls-per-minute to stay under the account quota",
            Self::ServerError(_) => "The provider may be experiencing issues, try again later",
            Self::AuthFailed => "Verify the provider token (--token or TUSHARE_TOKEN)",
            Self::ClientError(_) => "Review the dataset's call parameters",
            Self::ApiError(_) => "Check the provider message; the account may lack access to this API",
            Self::InvalidResponse => "The provider response format may have changed",
            Self::Generic => "Check the provider and try again",
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Classification of the failure that triggered the retry
    pub kind: FailureKind,
    /// Backoff duration until the next attempt
    pub backoff: Duration,
    /// Provider call identity (API name)
    pub call: String,
    /// Rendered call parameters
    pub params: String,
    /// Original error message
    pub error_message: String,
}

impl RetryContext {
    /// Convenience constructor used throughout the retry loop.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        kind: FailureKind,
        backoff: Duration,
        call: impl Into<String>,
        params: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            kind,
            backoff,
            call: call.into(),
            params: params.into(),
            error_message: error_message.into(),
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        format!(
            "Call {}({}) failed (attempt {}/{}): {} - {}; retrying in {:.1} seconds",
            self.call,
            self.params,
            self.attempt,
            self.max_attempts,
            self.kind.description(),
            self.error_message,
            self.backoff.as_secs_f64()
        )
    }

    /// Format the notice logged when a retried call finally succeeds.
    pub fn format_success(&self) -> String {
        format!(
            "Call {}({}) succeeded on attempt {}/{}",
            self.call, self.params, self.attempt, self.max_attempts
        )
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self) -> String {
        let mut lines = vec![
            format!(
                "[FAILED] Call {} gave up after {} attempts",
                self.call, self.max_attempts
            ),
            format!("  Last error: {}", self.error_message),
            format!("  Params: {}", self.params),
            "  Suggestions:".to_string(),
        ];

        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }

        lines.join("\n")
    }

    /// Derive suggestions tailored to the current retry context.
    pub fn format_suggestions(&self) -> Vec<String> {
        vec![
            self.kind.suggestion().to_string(),
            format!(
                "Try increasing --max-retries (current: {})",
                self.max_attempts
            ),
        ]
    }
}

/// Classify a reqwest failure that happened before a status was available.
pub fn classify_transport_error(err: &ReqwestError) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::NetworkTimeout;
    }
    if err.is_connect() {
        return FailureKind::NetworkOffline;
    }
    match err.status() {
        Some(status) => classify_status(status),
        None => FailureKind::Generic,
    }
}

/// Classify a reqwest status code.
pub fn classify_status(status: StatusCode) -> FailureKind {
    FailureKind::from_status(status.as_u16())
}
