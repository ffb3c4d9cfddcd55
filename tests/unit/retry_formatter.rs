//! Unit tests for retry message formatting

use refdata_ingest::provider::{FailureKind, RetryContext};
use std::time::Duration;

fn context(kind: FailureKind) -> RetryContext {
    RetryContext::new(
        2,
        5,
        kind,
        Duration::from_secs(60),
        "daily",
        "end_date=20080131, start_date=20080101",
        "HTTP 503: busy",
    )
}

#[test]
fn test_retry_message_includes_call_and_attempts() {
    let message = context(FailureKind::ServerError(503)).format_retry();
    assert_eq!(
        message,
        "Call daily(end_date=20080131, start_date=20080101) failed (attempt 2/5): \
         service unavailable - HTTP 503: busy; retrying in 60.0 seconds"
    );
}

#[test]
fn test_success_message() {
    let message = context(FailureKind::NetworkTimeout).format_success();
    assert_eq!(
        message,
        "Call daily(end_date=20080131, start_date=20080101) succeeded on attempt 2/5"
    );
}

#[test]
fn test_failure_summary_lists_suggestions() {
    let summary = context(FailureKind::RateLimit).format_failure();
    let lines: Vec<&str> = summary.lines().collect();

    assert_eq!(lines[0], "[FAILED] Call daily gave up after 5 attempts");
    assert!(summary.contains("Last error: HTTP 503: busy"));
    assert!(summary.contains("--calls-per-minute"));
    assert!(summary.contains("Try increasing --max-retries (current: 5)"));
}

#[test]
fn test_auth_suggestion_mentions_token() {
    let suggestions = context(FailureKind::AuthFailed).format_suggestions();
    assert_eq!(suggestions.len(), 2);
    assert!(suggestions[0].contains("TUSHARE_TOKEN"));
}

#[test]
fn test_descriptions() {
    assert_eq!(FailureKind::ServerError(502).description(), "bad gateway");
    assert_eq!(FailureKind::ServerError(500).description(), "server error");
    assert_eq!(FailureKind::ClientError(404).description(), "resource not found");
    assert_eq!(FailureKind::ApiError(-2001).description(), "provider API error");
}
