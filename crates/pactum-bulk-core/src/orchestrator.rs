//! End-to-end driver for one bulk operation.
//!
//! A submission flows selection → builder → dispatch (with retry) → poller
//! (when the server defers) → aggregator → export delivery. Each stage hands
//! the next an owned value; the orchestrator itself keeps no per-operation
//! state, so independent operations may share one instance.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::aggregate::aggregate;
use crate::builder::{BatchRequestBuilder, OperationIntent};
use crate::error::{BulkError, BulkResult};
use crate::export::{DeliveryOutcome, ExportDeliveryHandler};
use crate::model::{
    AsyncJobHandle, BulkOperationRequest, BulkOperationResult, DispatchOutcome, OperationStatus,
};
use crate::notice::OutcomeNotice;
use crate::poller::{JobPoller, PollOutcome};
use crate::retry::{RetryPolicy, with_retry_observed};
use crate::selection::SelectionController;
use crate::{BulkBackend, BulkObserver, NoopObserver};

/// How an orchestrated operation ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOutcome {
    /// A final, reconciled result.
    Finished {
        /// Aggregated result.
        result: BulkOperationResult,
        /// Export delivery, for export operations that produced something.
        delivery: Option<DeliveryOutcome>,
    },
    /// The caller cancelled before a result arrived.
    Abandoned {
        /// Job being waited on, when the server had already accepted one.
        job_id: Option<String>,
    },
}

impl BulkOutcome {
    /// Final result when the operation finished.
    #[must_use]
    pub const fn result(&self) -> Option<&BulkOperationResult> {
        match self {
            Self::Finished { result, .. } => Some(result),
            Self::Abandoned { .. } => None,
        }
    }

    /// User-facing summary of the outcome.
    #[must_use]
    pub fn notice(&self) -> OutcomeNotice {
        match self {
            Self::Finished { result, .. } => OutcomeNotice::for_result(result),
            Self::Abandoned { job_id } => OutcomeNotice::abandoned(job_id.as_deref()),
        }
    }
}

/// Runs bulk operations against a [`BulkBackend`].
pub struct BulkOrchestrator<B> {
    backend: B,
    retry: RetryPolicy<BulkError>,
    poller: JobPoller,
    delivery: ExportDeliveryHandler,
    observer: Arc<dyn BulkObserver>,
}

impl<B> fmt::Debug for BulkOrchestrator<B> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BulkOrchestrator")
            .field("retry", &self.retry)
            .field("poller", &self.poller)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

impl<B: BulkBackend> BulkOrchestrator<B> {
    /// Orchestrator with default retry, polling, and `contracts` export naming.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            poller: JobPoller::default(),
            delivery: ExportDeliveryHandler::new("contracts"),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the dispatch retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy<BulkError>) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the job poller.
    #[must_use]
    pub const fn with_poller(mut self, poller: JobPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Replace the export delivery handler.
    #[must_use]
    pub fn with_delivery(mut self, delivery: ExportDeliveryHandler) -> Self {
        self.delivery = delivery;
        self
    }

    /// Attach an observer for lifecycle events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BulkObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Backend in use.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Submit the controller's current selection.
    ///
    /// Pre-flight failures leave the selection untouched. Once a request has
    /// been dispatched, the selection is cleared regardless of the outcome.
    ///
    /// # Errors
    ///
    /// Returns pre-flight errors from the controller or builder, or any error
    /// from [`BulkOrchestrator::execute`].
    pub async fn submit(
        &self,
        controller: &mut SelectionController,
        builder: &BatchRequestBuilder,
        intent: OperationIntent,
        cancel: &CancellationToken,
    ) -> BulkResult<BulkOutcome> {
        let snapshot = controller.begin_submission()?;
        let request = match builder.build(&snapshot, intent) {
            Ok(request) => request,
            Err(err) => {
                controller.release();
                return Err(err);
            }
        };

        let outcome = self.execute(&request, cancel).await;
        controller.finish_submission();
        outcome
    }

    /// Dispatch `request`, wait for it if deferred, and reconcile the result.
    ///
    /// # Errors
    ///
    /// Returns the first terminal error from dispatch, polling, or export
    /// delivery. Per-item failures are reported inside the result instead.
    #[tracing::instrument(
        name = "bulk.execute",
        skip_all,
        fields(
            operation = %request.operation_type(),
            targets = request.target_ids().len(),
            idempotency_key = request.idempotency_key()
        )
    )]
    pub async fn execute(
        &self,
        request: &BulkOperationRequest,
        cancel: &CancellationToken,
    ) -> BulkResult<BulkOutcome> {
        let outcome = self.run(request, cancel).await;
        match &outcome {
            Ok(BulkOutcome::Finished { result, .. }) => {
                tracing::info!(
                    status = result.status.as_str(),
                    succeeded = result.success_count,
                    failed = result.failed_count,
                    "bulk operation finished"
                );
                self.observer.operation_finished(result);
            }
            Ok(BulkOutcome::Abandoned { .. }) => {}
            Err(err) => {
                tracing::warn!(error = %err, kind = err.kind(), "bulk operation failed");
                self.observer
                    .operation_failed(request.operation_type(), err);
            }
        }
        outcome
    }

    /// Wait for a job accepted earlier, for example by a previous session.
    ///
    /// Without the original request the result cannot be checked against the
    /// submitted ids; only its status is re-derived.
    ///
    /// # Errors
    ///
    /// Returns polling errors as [`JobPoller::poll`] does.
    pub async fn await_job(
        &self,
        handle: &AsyncJobHandle,
        cancel: &CancellationToken,
    ) -> BulkResult<BulkOutcome> {
        match self
            .poller
            .poll(&self.backend, handle, cancel, self.observer.as_ref())
            .await?
        {
            PollOutcome::Finished(mut result) => {
                result.status = OperationStatus::derive(result.success_count, result.failed_count);
                Ok(BulkOutcome::Finished {
                    result,
                    delivery: None,
                })
            }
            PollOutcome::Abandoned { job_id, .. } => Ok(BulkOutcome::Abandoned {
                job_id: Some(job_id),
            }),
        }
    }

    async fn run(
        &self,
        request: &BulkOperationRequest,
        cancel: &CancellationToken,
    ) -> BulkResult<BulkOutcome> {
        let operation = request.operation_type();
        let observer = self.observer.as_ref();

        let dispatch = with_retry_observed(
            &self.retry,
            |_| self.backend.dispatch(request),
            |state, delay| observer.dispatch_retried(operation, state.attempt, delay),
        );
        let dispatched = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("dispatch cancelled");
                return Ok(BulkOutcome::Abandoned { job_id: None });
            }
            dispatched = dispatch => dispatched?,
        };

        let raw = match dispatched {
            DispatchOutcome::Immediate(result) => result,
            DispatchOutcome::Accepted(handle) => {
                tracing::info!(job_id = %handle.job_id, "bulk job accepted for background processing");
                match self
                    .poller
                    .poll(&self.backend, &handle, cancel, observer)
                    .await?
                {
                    PollOutcome::Finished(result) => result,
                    PollOutcome::Abandoned { job_id, .. } => {
                        return Ok(BulkOutcome::Abandoned {
                            job_id: Some(job_id),
                        });
                    }
                }
            }
        };

        let result = aggregate(request, raw);
        let delivery = match request.export_spec() {
            Some(spec) if result.status != OperationStatus::Failed => {
                Some(self.delivery.deliver(&result, spec, None)?)
            }
            _ => None,
        };

        Ok(BulkOutcome::Finished { result, delivery })
    }
}
