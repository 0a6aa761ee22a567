//! Prometheus-backed bulk operation metrics.
//!
//! # Design
//! - Collector registration stays private; callers only see the observer hooks.
//! - Label values come from the core's stable lowercase labels, so cardinality
//!   is bounded by the number of operations, states, and error codes.

use std::sync::Arc;
use std::time::Duration;

use pactum_bulk_core::{BulkError, BulkObserver, BulkOperationResult, JobState, OperationType};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Metrics registry recording bulk operation activity.
#[derive(Clone)]
pub struct BulkMetrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    operations_total: IntCounterVec,
    operation_failures_total: IntCounterVec,
    dispatch_retries_total: IntCounterVec,
    job_polls_total: IntCounterVec,
    item_failures_total: IntCounterVec,
    jobs_timed_out_total: IntCounter,
    jobs_abandoned_total: IntCounter,
    last_processing_time_ms: IntGauge,
    totals: Totals,
}

/// Unregistered running totals backing [`MetricsSnapshot`] for labelled collectors.
struct Totals {
    operations: IntCounter,
    operation_failures: IntCounter,
    dispatch_retries: IntCounter,
    job_polls: IntCounter,
    item_failures: IntCounter,
}

impl Totals {
    fn new() -> Result<Self> {
        let total = |name: &'static str| {
            IntCounter::new(name, "snapshot total")
                .map_err(TelemetryError::building(name))
        };
        Ok(Self {
            operations: total("operations")?,
            operation_failures: total("operation_failures")?,
            dispatch_retries: total("dispatch_retries")?,
            job_polls: total("job_polls")?,
            item_failures: total("item_failures")?,
        })
    }
}

/// Point-in-time view of the unlabelled collectors plus label totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Operations that produced a result, across every status.
    pub operations_total: u64,
    /// Operations that ended with an error instead of a result.
    pub operation_failures_total: u64,
    /// Dispatch attempts scheduled after a transient failure.
    pub dispatch_retries_total: u64,
    /// Status queries issued for asynchronous jobs.
    pub job_polls_total: u64,
    /// Item-level failures reported inside results.
    pub item_failures_total: u64,
    /// Jobs the client stopped waiting for after the poll budget.
    pub jobs_timed_out_total: u64,
    /// Jobs abandoned by cancellation.
    pub jobs_abandoned_total: u64,
    /// Server-reported processing time of the latest result.
    pub last_processing_time_ms: i64,
}

impl BulkMetrics {
    /// Construct a registry with every bulk collector registered.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] if a collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let operations_total = counter_vec(
            &registry,
            "bulk_operations_total",
            "Bulk operations that produced a result, by operation and status",
            &["operation", "status"],
        )?;
        let operation_failures_total = counter_vec(
            &registry,
            "bulk_operation_failures_total",
            "Bulk operations that ended with an error, by operation and kind",
            &["operation", "kind"],
        )?;
        let dispatch_retries_total = counter_vec(
            &registry,
            "bulk_dispatch_retries_total",
            "Dispatch retries after transient failures",
            &["operation"],
        )?;
        let job_polls_total = counter_vec(
            &registry,
            "bulk_job_polls_total",
            "Status queries for asynchronous jobs, by observed state",
            &["state"],
        )?;
        let item_failures_total = counter_vec(
            &registry,
            "bulk_item_failures_total",
            "Item-level failures reported in results, by error code",
            &["code"],
        )?;
        let jobs_timed_out_total = counter(
            &registry,
            "bulk_jobs_timed_out_total",
            "Asynchronous jobs that exceeded the poll budget",
        )?;
        let jobs_abandoned_total = counter(
            &registry,
            "bulk_jobs_abandoned_total",
            "Asynchronous jobs abandoned by cancellation",
        )?;
        let last_processing_time_ms = IntGauge::with_opts(Opts::new(
            "bulk_last_processing_time_ms",
            "Server-reported processing time of the latest result (ms)",
        ))
        .map_err(TelemetryError::building("bulk_last_processing_time_ms"))?;
        registry
            .register(Box::new(last_processing_time_ms.clone()))
            .map_err(TelemetryError::registering("bulk_last_processing_time_ms"))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                operations_total,
                operation_failures_total,
                dispatch_retries_total,
                job_polls_total,
                item_failures_total,
                jobs_timed_out_total,
                jobs_abandoned_total,
                last_processing_time_ms,
                totals: Totals::new()?,
            }),
        })
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError`] if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|source| TelemetryError::Exposition { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionUtf8 { source })
    }

    /// Take a snapshot; labelled collectors are reported as totals across labels.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            operations_total: inner.totals.operations.get(),
            operation_failures_total: inner.totals.operation_failures.get(),
            dispatch_retries_total: inner.totals.dispatch_retries.get(),
            job_polls_total: inner.totals.job_polls.get(),
            item_failures_total: inner.totals.item_failures.get(),
            jobs_timed_out_total: inner.jobs_timed_out_total.get(),
            jobs_abandoned_total: inner.jobs_abandoned_total.get(),
            last_processing_time_ms: inner.last_processing_time_ms.get(),
        }
    }
}

impl std::fmt::Debug for BulkMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkMetrics").finish_non_exhaustive()
    }
}

impl BulkObserver for BulkMetrics {
    fn dispatch_retried(&self, operation: OperationType, _attempt: u32, _delay: Duration) {
        self.inner
            .dispatch_retries_total
            .with_label_values(&[operation.as_str()])
            .inc();
        self.inner.totals.dispatch_retries.inc();
    }

    fn job_polled(&self, _job_id: &str, state: JobState) {
        self.inner
            .job_polls_total
            .with_label_values(&[state.as_str()])
            .inc();
        self.inner.totals.job_polls.inc();
    }

    fn job_timed_out(&self, _job_id: &str) {
        self.inner.jobs_timed_out_total.inc();
    }

    fn job_abandoned(&self, _job_id: &str) {
        self.inner.jobs_abandoned_total.inc();
    }

    fn operation_finished(&self, result: &BulkOperationResult) {
        self.inner
            .operations_total
            .with_label_values(&[result.operation_type.as_str(), result.status.as_str()])
            .inc();
        self.inner.totals.operations.inc();
        for error in &result.errors {
            self.inner
                .item_failures_total
                .with_label_values(&[error.error_code.as_str()])
                .inc();
            self.inner.totals.item_failures.inc();
        }
        self.inner
            .last_processing_time_ms
            .set(i64::try_from(result.processing_time_ms).unwrap_or(i64::MAX));
    }

    fn operation_failed(&self, operation: OperationType, error: &BulkError) {
        self.inner
            .operation_failures_total
            .with_label_values(&[operation.as_str(), error.kind()])
            .inc();
        self.inner.totals.operation_failures.inc();
    }
}

fn counter_vec(
    registry: &Registry,
    name: &'static str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec> {
    let collector = IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(TelemetryError::building(name))?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(TelemetryError::registering(name))?;
    Ok(collector)
}

fn counter(registry: &Registry, name: &'static str, help: &str) -> Result<IntCounter> {
    let collector = IntCounter::with_opts(Opts::new(name, help))
        .map_err(TelemetryError::building(name))?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(TelemetryError::registering(name))?;
    Ok(collector)
}
