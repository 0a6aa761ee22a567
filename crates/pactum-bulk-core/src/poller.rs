//! Status polling for asynchronous bulk jobs.
//!
//! The poller queries immediately, then once per interval, until the job is
//! terminal. It gives up with [`BulkError::JobTimeout`] rather than start a
//! query past the wait budget, and returns [`PollOutcome::Abandoned`] when the
//! caller cancels.

use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::{BulkError, BulkResult};
use crate::model::{AsyncJobHandle, BulkOperationResult, JobState};
use crate::retry::{RetryPolicy, with_retry};
use crate::{BulkBackend, BulkObserver};

/// Timing budget for a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Longest time to wait for a terminal state.
    pub max_wait: Duration,
    /// Default cadence between status queries.
    pub base_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(30_000),
            base_interval: Duration::from_millis(2_000),
        }
    }
}

/// How a polling session ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The job completed; the server's result is returned unmodified.
    Finished(BulkOperationResult),
    /// The caller cancelled; no further queries were issued.
    Abandoned {
        /// Job that was being polled.
        job_id: String,
        /// Status queries issued before cancellation.
        polls: u32,
    },
}

/// Drives the job state machine until a terminal state, timeout, or cancellation.
#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    settings: PollSettings,
    retry: RetryPolicy<BulkError>,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(PollSettings::default())
    }
}

impl JobPoller {
    /// Poller with the given budget; each status query gets the default retry policy.
    #[must_use]
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy applied to individual status queries.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy<BulkError>) -> Self {
        self.retry = retry;
        self
    }

    /// Timing budget in use.
    #[must_use]
    pub const fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Poll `handle` until it reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::JobTimeout`] when the budget runs out,
    /// [`BulkError::JobFailed`] when the server reports a failed job,
    /// [`BulkError::MalformedResponse`] when a completed job carries no result,
    /// and any error surfaced by the status query itself.
    pub async fn poll<B>(
        &self,
        backend: &B,
        handle: &AsyncJobHandle,
        cancel: &CancellationToken,
        observer: &dyn BulkObserver,
    ) -> BulkResult<PollOutcome>
    where
        B: BulkBackend + ?Sized,
    {
        let interval = handle.poll_interval(self.settings.base_interval);
        let started = Instant::now();
        let deadline = started + self.settings.max_wait;
        let mut state = JobState::Pending;
        let mut polls = 0_u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(abandon(handle, polls, observer));
            }

            polls += 1;
            // Retries of a flaky status query share the session's wait budget.
            let report = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(abandon(handle, polls, observer)),
                report = with_retry(&self.retry, |_| backend.job_status(handle)) => report?,
                () = sleep_until(deadline) => {
                    return Err(time_out(handle, polls, started.elapsed(), observer));
                }
            };
            observer.job_polled(&handle.job_id, report.state);

            let next = state.advance(report.state);
            if next != state {
                tracing::debug!(
                    job_id = %handle.job_id,
                    from = state.as_str(),
                    to = next.as_str(),
                    "job state changed"
                );
                state = next;
            }

            match state {
                JobState::Completed => {
                    let result = report.result.ok_or_else(|| {
                        BulkError::malformed("job status", "completed job carried no result")
                    })?;
                    tracing::info!(job_id = %handle.job_id, polls, "job completed");
                    return Ok(PollOutcome::Finished(result));
                }
                JobState::Failed => {
                    return Err(BulkError::JobFailed {
                        job_id: handle.job_id.clone(),
                        message: report
                            .error
                            .unwrap_or_else(|| "job failed without a reason".to_string()),
                    });
                }
                JobState::Pending | JobState::Processing | JobState::TimedOut => {}
            }

            let elapsed = started.elapsed();
            if elapsed + interval > self.settings.max_wait {
                return Err(time_out(handle, polls, elapsed, observer));
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(abandon(handle, polls, observer)),
                () = sleep(interval) => {}
            }
        }
    }
}

fn abandon(handle: &AsyncJobHandle, polls: u32, observer: &dyn BulkObserver) -> PollOutcome {
    tracing::info!(job_id = %handle.job_id, polls, "polling cancelled");
    observer.job_abandoned(&handle.job_id);
    PollOutcome::Abandoned {
        job_id: handle.job_id.clone(),
        polls,
    }
}

fn time_out(
    handle: &AsyncJobHandle,
    polls: u32,
    elapsed: Duration,
    observer: &dyn BulkObserver,
) -> BulkError {
    tracing::warn!(
        job_id = %handle.job_id,
        polls,
        waited_ms = duration_ms(elapsed),
        "job did not finish within the wait budget"
    );
    observer.job_timed_out(&handle.job_id);
    BulkError::JobTimeout {
        job_id: handle.job_id.clone(),
        waited_ms: duration_ms(elapsed),
        polls,
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
