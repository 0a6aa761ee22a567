#![forbid(unsafe_code)]
#![deny(
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery)]

//! Bulk operation orchestration for Pactum list views.
//!
//! Layout: `selection.rs` (what the user picked), `builder.rs` (validated
//! requests), `retry.rs` and `poller.rs` (transport resilience and async jobs),
//! `aggregate.rs` (result reconciliation), `export.rs` (artifact delivery),
//! `notice.rs` (user-facing summaries), and `orchestrator.rs` which drives the
//! whole pipeline against a [`BulkBackend`].

use std::time::Duration;

use async_trait::async_trait;

pub mod aggregate;
pub mod builder;
pub mod error;
pub mod export;
pub mod model;
pub mod notice;
pub mod orchestrator;
pub mod poller;
pub mod retry;
pub mod selection;

pub use aggregate::{aggregate, aggregate_outcome};
pub use builder::{
    BatchRequestBuilder, FixedKeySource, IdempotencyKeySource, OperationIntent, RandomKeySource,
};
pub use error::{BulkError, BulkResult};
pub use export::{DeliveryOutcome, ExportArtifact, ExportDeliveryHandler};
pub use model::{
    AsyncJobHandle, BulkOperationRequest, BulkOperationResult, DispatchOutcome, ErrorCode,
    ExportFormat, ExportReceipt, ExportSpec, FieldUpdates, InlineExport, JobState,
    JobStatusReport, MAX_BATCH_SIZE, OperationError, OperationPayload, OperationStatus,
    OperationType,
};
pub use notice::{NoticeLevel, OutcomeNotice};
pub use orchestrator::{BulkOrchestrator, BulkOutcome};
pub use poller::{JobPoller, PollOutcome, PollSettings};
pub use retry::{RetryFailure, RetryPolicy, RetryState, with_retry, with_retry_observed};
pub use selection::{SelectionController, SelectionSet};

/// Transport that carries bulk requests to the server.
///
/// Implementations classify transport failures into [`BulkError`] variants;
/// retry and polling cadence are handled by the caller.
#[async_trait]
pub trait BulkBackend: Send + Sync {
    /// Submit a request once.
    async fn dispatch(&self, request: &BulkOperationRequest) -> BulkResult<DispatchOutcome>;

    /// Query the state of an accepted job once.
    async fn job_status(&self, handle: &AsyncJobHandle) -> BulkResult<JobStatusReport>;
}

/// Receives lifecycle events from the orchestrator for logging and metrics.
pub trait BulkObserver: Send + Sync {
    /// A dispatch attempt failed and will be retried after `delay`.
    fn dispatch_retried(&self, _operation: OperationType, _attempt: u32, _delay: Duration) {}

    /// A status query returned `state`.
    fn job_polled(&self, _job_id: &str, _state: JobState) {}

    /// Polling gave up on a job.
    fn job_timed_out(&self, _job_id: &str) {}

    /// Polling was cancelled by the caller.
    fn job_abandoned(&self, _job_id: &str) {}

    /// An operation produced a final result.
    fn operation_finished(&self, _result: &BulkOperationResult) {}

    /// An operation ended with an error.
    fn operation_failed(&self, _operation: OperationType, _error: &BulkError) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BulkObserver for NoopObserver {}
