//! Bounded retry with exponential backoff around provider calls
//!
//! Each [`RetryingInvoker::invoke`] owns its attempt counter, so one invoker
//! can serve many datasets concurrently; the only shared state is the
//! [`CallThrottler`] every attempt passes through.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::config::RetryPolicy;
use super::rate_limit::CallThrottler;
use super::IngestError;
use crate::metrics::{record_provider_call, record_retry_backoff};
use crate::provider::{ProviderResult, RetryContext};
use crate::shutdown::SharedShutdown;
use crate::{CallParams, RowSet};

/// Executes provider calls under the throttle with bounded retries
#[derive(Clone)]
pub struct RetryingInvoker {
    throttler: Arc<CallThrottler>,
    policy: RetryPolicy,
    shutdown: Option<SharedShutdown>,
}

impl RetryingInvoker {
    /// Create an invoker sharing `throttler`
    pub fn new(throttler: Arc<CallThrottler>, policy: RetryPolicy) -> Self {
        Self {
            throttler,
            policy,
            shutdown: None,
        }
    }

    /// Abort backoff sleeps when shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Retry budget in use
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Throttler shared by every attempt
    pub fn throttler(&self) -> &Arc<CallThrottler> {
        &self.throttler
    }

    /// Call `call(params)` until it succeeds or the attempt budget is spent
    ///
    /// Every attempt first waits for a throttle slot. After the failure of
    /// attempt `i` (0-based) the invoker sleeps `2^i * base_backoff`; no sleep
    /// follows the last attempt.
    ///
    /// # Arguments
    /// * `call_name` - Provider call identity used in logs and errors
    /// * `params` - Parameters passed (cloned) to every attempt
    /// * `call` - The provider call
    ///
    /// # Errors
    /// [`IngestError::ProviderExhausted`] with the last failure once
    /// `max_attempts` calls have failed, or [`IngestError::Cancelled`] if
    /// shutdown is requested during a backoff.
    pub async fn invoke<F, Fut>(
        &self,
        call_name: &str,
        params: &CallParams,
        mut call: F,
    ) -> Result<RowSet, IngestError>
    where
        F: FnMut(CallParams) -> Fut,
        Fut: Future<Output = ProviderResult<RowSet>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        let mut last_failure: Option<RetryContext> = None;

        loop {
            self.throttler.wait_for_slot().await;

            let started = Instant::now();
            let result = call(params.clone()).await;
            record_provider_call(call_name, result.is_ok(), started.elapsed());

            let err = match result {
                Ok(rows) => {
                    if let Some(mut ctx) = last_failure.take() {
                        ctx.attempt = attempt + 1;
                        info!(call = call_name, "{}", ctx.format_success());
                    }
                    return Ok(rows);
                }
                Err(err) => err,
            };

            let backoff = self.policy.backoff(attempt);
            let ctx = RetryContext::new(
                attempt + 1,
                max_attempts,
                err.kind(),
                backoff,
                call_name,
                params.to_string(),
                err.to_string(),
            );
            attempt += 1;

            if attempt >= max_attempts {
                error!(
                    call = call_name,
                    params = %params,
                    attempts = attempt,
                    "{}",
                    ctx.format_failure()
                );
                return Err(IngestError::ProviderExhausted {
                    call: call_name.to_string(),
                    params: params.clone(),
                    attempts: attempt,
                    source: err,
                });
            }

            warn!(
                call = call_name,
                params = %params,
                attempt = attempt,
                "{}",
                ctx.format_retry()
            );
            record_retry_backoff(backoff, attempt);
            last_failure = Some(ctx);

            match &self.shutdown {
                Some(shutdown) => {
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.wait_for_shutdown() => return Err(IngestError::Cancelled),
                    }
                }
                None => tokio::time::sleep(backoff).await,
            }
        }
    }
}
