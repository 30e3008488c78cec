//! Bounded retry around a single external-service call.
//!
//! The [`RetryInvoker`] makes up to `max_attempts` attempts separated by a
//! fixed delay. Errors the provider marked as non-retryable (authentication,
//! malformed request) stop immediately unless the policy retries all errors.
//! A [`RetryObserver`] sees every retry, success, and exhaustion; it exists
//! for logging and metrics only and cannot change the outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use notegen_core::{defaults, Error};

// =============================================================================
// POLICY
// =============================================================================

/// Fixed-attempt, fixed-delay retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay between consecutive attempts.
    pub delay: Duration,
    /// Retry every error, ignoring the provider's retryable flag.
    pub retry_all: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            delay: Duration::from_millis(defaults::RETRY_DELAY_MS),
            retry_all: false,
        }
    }
}

impl RetryPolicy {
    /// Policy with a fixed delay.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            retry_all: false,
        }
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Also retry errors the provider marked as non-retryable.
    pub fn with_retry_all(mut self, retry_all: bool) -> Self {
        self.retry_all = retry_all;
        self
    }

    fn should_retry(&self, err: &Error) -> bool {
        self.retry_all || err.is_retryable()
    }
}

// =============================================================================
// OBSERVER
// =============================================================================

/// Hooks invoked around retried calls.
pub trait RetryObserver: Send + Sync {
    /// Attempt `attempt` failed and another attempt follows after `delay`.
    fn on_retry(&self, operation: &str, attempt: u32, error: &Error, delay: Duration);

    /// The call succeeded on attempt `attempts`.
    fn on_success(&self, operation: &str, attempts: u32);

    /// The call failed for good after `attempts` attempts.
    fn on_exhausted(&self, operation: &str, attempts: u32, error: &Error);
}

/// Observer that emits structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_retry(&self, operation: &str, attempt: u32, error: &Error, delay: Duration) {
        warn!(
            subsystem = "jobs",
            component = "retry",
            op = operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "External call failed, retrying"
        );
    }

    fn on_success(&self, operation: &str, attempts: u32) {
        if attempts > 1 {
            info!(
                subsystem = "jobs",
                component = "retry",
                op = operation,
                attempts,
                "External call succeeded after retries"
            );
        } else {
            debug!(
                subsystem = "jobs",
                component = "retry",
                op = operation,
                "External call succeeded"
            );
        }
    }

    fn on_exhausted(&self, operation: &str, attempts: u32, error: &Error) {
        error!(
            subsystem = "jobs",
            component = "retry",
            op = operation,
            attempts,
            error = %error,
            "External call failed, giving up"
        );
    }
}

// =============================================================================
// INVOKER
// =============================================================================

/// A call that failed on every permitted attempt.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: Error,
}

impl std::fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plural = if self.attempts == 1 { "" } else { "s" };
        write!(
            f,
            "Technical failure after {} attempt{}: {}",
            self.attempts, plural, self.last_error
        )
    }
}

impl std::error::Error for RetryExhausted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

/// Runs a zero-argument async call under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryInvoker {
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl std::fmt::Debug for RetryInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryInvoker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryInvoker {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(TracingRetryObserver),
        }
    }

    /// Replace the default logging observer.
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `call` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget runs out.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = notegen_core::Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            match call().await {
                Ok(value) => {
                    self.observer.on_success(operation, attempt);
                    return Ok(value);
                }
                Err(err) => {
                    debug!(
                        subsystem = "jobs",
                        component = "retry",
                        op = operation,
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        retryable = err.is_retryable(),
                        "External call attempt failed"
                    );
                    if attempt >= max_attempts || !self.policy.should_retry(&err) {
                        self.observer.on_exhausted(operation, attempt, &err);
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                    self.observer
                        .on_retry(operation, attempt, &err, self.policy.delay);
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
