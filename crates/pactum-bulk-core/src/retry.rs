//! Exponential-backoff retry for fallible async calls.
//!
//! The wait between attempts is `base_delay * backoff_factor^(attempt - 1)` and
//! is an async sleep, so other work on the runtime keeps running.

use std::fmt::{self, Display};
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::BulkError;

/// Ceiling applied to a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retry parameters for one dispatch chain.
pub struct RetryPolicy<E> {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor applied to the delay after each failure.
    pub backoff_factor: f64,
    /// Decides whether a failure may be retried.
    pub retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("backoff_factor", &self.backoff_factor)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy<BulkError> {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            backoff_factor: 2.0,
            retryable: BulkError::is_transient,
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Policy that makes a single attempt.
    #[must_use]
    pub const fn no_retry(retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
            retryable,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }
}

/// Per-call retry bookkeeping; lives only for one attempt chain.
#[derive(Debug)]
pub struct RetryState<E> {
    /// Attempt currently being made (1-based).
    pub attempt: u32,
    /// Attempts allowed by the policy.
    pub max_attempts: u32,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff growth factor.
    pub backoff_factor: f64,
    /// Failure observed on the previous attempt.
    pub last_error: Option<E>,
}

impl<E> RetryState<E> {
    fn new(policy: &RetryPolicy<E>) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts.max(1),
            base_delay_ms: u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_factor: policy.backoff_factor,
            last_error: None,
        }
    }
}

/// Final failure of a retried call along with the number of attempts made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Error returned by the last attempt.
    pub error: E,
}

impl<E: Display> Display for RetryFailure<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} (after {} attempt(s))", self.error, self.attempts)
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryFailure<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<RetryFailure<BulkError>> for BulkError {
    fn from(failure: RetryFailure<BulkError>) -> Self {
        failure.error.with_attempts(failure.attempts)
    }
}

/// Run `operation` under `policy`.
///
/// # Errors
///
/// Returns the last error once it is not retryable or the attempts are used up.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    operation: F,
) -> Result<T, RetryFailure<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_observed(policy, operation, |_, _| {}).await
}

/// Run `operation` under `policy`, reporting every scheduled retry to `observe`.
///
/// `observe` receives the state after a failed attempt and the delay before
/// the next one.
///
/// # Errors
///
/// Returns the last error once it is not retryable or the attempts are used up.
pub async fn with_retry_observed<T, E, F, Fut, O>(
    policy: &RetryPolicy<E>,
    mut operation: F,
    mut observe: O,
) -> Result<T, RetryFailure<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    O: FnMut(&RetryState<E>, Duration),
{
    let mut state = RetryState::new(policy);
    loop {
        state.attempt += 1;
        match operation(state.attempt).await {
            Ok(value) => {
                if state.attempt > 1 {
                    tracing::info!(attempt = state.attempt, "call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !(policy.retryable)(&error) || state.attempt >= state.max_attempts {
                    return Err(RetryFailure {
                        attempts: state.attempt,
                        error,
                    });
                }
                let delay = policy.delay_for(state.attempt);
                tracing::warn!(
                    attempt = state.attempt,
                    max_attempts = state.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "retrying after failure"
                );
                state.last_error = Some(error);
                observe(&state, delay);
                sleep(delay).await;
            }
        }
    }
}
