//! Scripted [`BulkBackend`] doubles.
//!
//! The backend replays queued responses in order and keeps an idempotency
//! ledger, so a retried dispatch carrying an already applied key replays the
//! stored outcome instead of applying the work again.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pactum_bulk_core::{
    AsyncJobHandle, BulkBackend, BulkError, BulkObserver, BulkOperationRequest,
    BulkOperationResult, BulkResult, DispatchOutcome, JobState, JobStatusReport, OperationType,
};

/// One scripted reaction to a dispatch.
#[derive(Debug, Clone)]
pub enum DispatchStep {
    /// Answer with the given outcome or error; successful outcomes are applied.
    Respond(BulkResult<DispatchOutcome>),
    /// Apply the request but lose the response, surfacing a transient failure.
    ApplyThenDrop(DispatchOutcome),
}

#[derive(Debug, Default)]
struct Script {
    dispatches: VecDeque<DispatchStep>,
    statuses: VecDeque<BulkResult<JobStatusReport>>,
    ledger: HashMap<String, DispatchOutcome>,
    dispatch_keys: Vec<String>,
    polled_jobs: Vec<String>,
    applied: u32,
    replayed: u32,
}

/// Backend that answers from queued scripts and records every call.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    /// Backend with empty scripts; unscripted calls fail as malformed responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a dispatch reaction.
    #[must_use]
    pub fn then_dispatch(self, step: DispatchStep) -> Self {
        self.lock().dispatches.push_back(step);
        self
    }

    /// Queue a dispatch that answers immediately with `result`.
    #[must_use]
    pub fn then_immediate(self, result: BulkOperationResult) -> Self {
        self.then_dispatch(DispatchStep::Respond(Ok(DispatchOutcome::Immediate(result))))
    }

    /// Queue a dispatch that accepts a background job.
    #[must_use]
    pub fn then_accepted(self, handle: AsyncJobHandle) -> Self {
        self.then_dispatch(DispatchStep::Respond(Ok(DispatchOutcome::Accepted(handle))))
    }

    /// Queue a dispatch failure.
    #[must_use]
    pub fn then_dispatch_error(self, error: BulkError) -> Self {
        self.then_dispatch(DispatchStep::Respond(Err(error)))
    }

    /// Queue a status query answer.
    #[must_use]
    pub fn then_status(self, report: BulkResult<JobStatusReport>) -> Self {
        self.lock().statuses.push_back(report);
        self
    }

    /// Queue `count` identical status answers in `state`.
    #[must_use]
    pub fn then_statuses(self, state: JobState, count: usize) -> Self {
        {
            let mut script = self.lock();
            for _ in 0..count {
                script.statuses.push_back(Ok(JobStatusReport {
                    state,
                    result: None,
                    error: None,
                }));
            }
        }
        self
    }

    /// Dispatch calls received, including replays.
    #[must_use]
    pub fn dispatch_calls(&self) -> usize {
        self.lock().dispatch_keys.len()
    }

    /// Status queries received.
    #[must_use]
    pub fn status_calls(&self) -> usize {
        self.lock().polled_jobs.len()
    }

    /// Idempotency keys in the order dispatches arrived.
    #[must_use]
    pub fn dispatch_keys(&self) -> Vec<String> {
        self.lock().dispatch_keys.clone()
    }

    /// Times the backend actually applied work.
    #[must_use]
    pub fn applied(&self) -> u32 {
        self.lock().applied
    }

    /// Times a known key replayed a stored outcome.
    #[must_use]
    pub fn replayed(&self) -> u32 {
        self.lock().replayed
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl BulkBackend for ScriptedBackend {
    async fn dispatch(&self, request: &BulkOperationRequest) -> BulkResult<DispatchOutcome> {
        let mut script = self.lock();
        let key = request.idempotency_key().to_string();
        script.dispatch_keys.push(key.clone());

        if let Some(stored) = script.ledger.get(&key).cloned() {
            script.replayed += 1;
            return Ok(stored);
        }

        match script.dispatches.pop_front() {
            Some(DispatchStep::Respond(Ok(outcome))) => {
                script.applied += 1;
                script.ledger.insert(key, outcome.clone());
                Ok(outcome)
            }
            Some(DispatchStep::Respond(Err(error))) => Err(error),
            Some(DispatchStep::ApplyThenDrop(outcome)) => {
                script.applied += 1;
                script.ledger.insert(key, outcome);
                Err(BulkError::transient(None, "connection reset before response"))
            }
            None => Err(BulkError::malformed("dispatch", "no scripted dispatch left")),
        }
    }

    async fn job_status(&self, handle: &AsyncJobHandle) -> BulkResult<JobStatusReport> {
        let mut script = self.lock();
        script.polled_jobs.push(handle.job_id.clone());
        script
            .statuses
            .pop_front()
            .unwrap_or_else(|| Err(BulkError::malformed("job status", "no scripted status left")))
    }
}

/// Event captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    /// A dispatch retry was scheduled.
    Retried {
        /// Operation being retried.
        operation: OperationType,
        /// Failed attempt number.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// A status query returned.
    Polled(JobState),
    /// Polling timed out.
    TimedOut(String),
    /// Polling was cancelled.
    Abandoned(String),
    /// The operation finished with the given success and failure counts.
    Finished(u32, u32),
    /// The operation failed with the given error kind.
    Failed(&'static str),
}

/// Observer that records every lifecycle event in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    /// Events seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.lock().clone()
    }

    /// Delays of every scheduled dispatch retry.
    #[must_use]
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Retried { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ObservedEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ObservedEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl BulkObserver for RecordingObserver {
    fn dispatch_retried(&self, operation: OperationType, attempt: u32, delay: Duration) {
        self.push(ObservedEvent::Retried {
            operation,
            attempt,
            delay,
        });
    }

    fn job_polled(&self, _job_id: &str, state: JobState) {
        self.push(ObservedEvent::Polled(state));
    }

    fn job_timed_out(&self, job_id: &str) {
        self.push(ObservedEvent::TimedOut(job_id.to_string()));
    }

    fn job_abandoned(&self, job_id: &str) {
        self.push(ObservedEvent::Abandoned(job_id.to_string()));
    }

    fn operation_finished(&self, result: &BulkOperationResult) {
        self.push(ObservedEvent::Finished(
            result.success_count,
            result.failed_count,
        ));
    }

    fn operation_failed(&self, _operation: OperationType, error: &BulkError) {
        self.push(ObservedEvent::Failed(error.kind()));
    }
}
