//! Value types exchanged between the bulk orchestration stages.
//!
//! # Design
//! - Requests are immutable once built; only the builder can construct them.
//! - Results are plain values so independent batches never share state.
//! - Wire encodings live in `pactum-api-models`; these types stay transport-agnostic.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BulkError;

/// Default upper bound on the number of targets a single bulk request may carry.
pub const MAX_BATCH_SIZE: usize = 100;

/// Kind of work applied across a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Apply field updates to every target.
    Update,
    /// Delete every target.
    Delete,
    /// Export every target into a downloadable artifact.
    Export,
}

impl OperationType {
    /// Stable lowercase label used in paths, logs, and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }
}

impl Display for OperationType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Export artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Comma-separated values.
    #[serde(rename = "CSV")]
    Csv,
    /// Excel workbook.
    #[serde(rename = "EXCEL")]
    Excel,
    /// JSON document.
    #[serde(rename = "JSON")]
    Json,
}

impl ExportFormat {
    /// Name used on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Excel => "EXCEL",
            Self::Json => "JSON",
        }
    }

    /// File extension for artifacts in this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "xlsx",
            Self::Json => "json",
        }
    }

    /// MIME type for artifacts in this format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Json => "application/json",
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.wire_name())
    }
}

impl FromStr for ExportFormat {
    type Err = BulkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "excel" | "xlsx" => Ok(Self::Excel),
            "json" => Ok(Self::Json),
            other => Err(BulkError::InvalidPayload {
                operation: OperationType::Export,
                reason: format!("unsupported export format '{other}'"),
            }),
        }
    }
}

/// Export parameters carried by an export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSpec {
    /// Output format.
    pub format: ExportFormat,
    /// Ordered field names to include in the artifact.
    pub fields: Vec<String>,
    /// Whether server-side metadata columns are appended.
    #[serde(default)]
    pub include_metadata: bool,
}

/// Ordered field name to new value mapping for update operations.
pub type FieldUpdates = IndexMap<String, Value>;

/// Operation-specific payload attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperationPayload {
    /// Field updates applied to every target.
    UpdateFields(FieldUpdates),
    /// Delete acknowledgment; always `true` once built.
    DeleteConfirmation(bool),
    /// Export parameters.
    ExportSpec(ExportSpec),
}

impl OperationPayload {
    /// Operation type implied by the payload variant.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        match self {
            Self::UpdateFields(_) => OperationType::Update,
            Self::DeleteConfirmation(_) => OperationType::Delete,
            Self::ExportSpec(_) => OperationType::Export,
        }
    }
}

/// A validated request describing one operation over an ordered set of targets.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperationRequest {
    operation_type: OperationType,
    target_ids: Vec<String>,
    payload: OperationPayload,
    idempotency_key: String,
}

impl BulkOperationRequest {
    pub(crate) fn new(
        target_ids: Vec<String>,
        payload: OperationPayload,
        idempotency_key: String,
    ) -> Self {
        Self {
            operation_type: payload.operation_type(),
            target_ids,
            payload,
            idempotency_key,
        }
    }

    /// Operation applied by this request.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Targets in selection order.
    #[must_use]
    pub fn target_ids(&self) -> &[String] {
        &self.target_ids
    }

    /// Operation payload.
    #[must_use]
    pub const fn payload(&self) -> &OperationPayload {
        &self.payload
    }

    /// Key identifying this logical submission across retries.
    #[must_use]
    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    /// Export parameters when this is an export request.
    #[must_use]
    pub const fn export_spec(&self) -> Option<&ExportSpec> {
        match &self.payload {
            OperationPayload::ExportSpec(spec) => Some(spec),
            _ => None,
        }
    }

    /// Number of targets as reported in results.
    #[must_use]
    pub fn target_count(&self) -> u32 {
        u32::try_from(self.target_ids.len()).unwrap_or(u32::MAX)
    }
}

/// Per-item failure classification reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The item failed server-side validation.
    ValidationError,
    /// The caller may not modify the item.
    PermissionDenied,
    /// The item does not exist.
    NotFound,
    /// The item changed concurrently.
    Conflict,
    /// Any other server failure.
    Internal,
}

impl ErrorCode {
    /// Parse a wire code; unknown codes collapse to [`ErrorCode::Internal`].
    #[must_use]
    pub fn from_wire(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "VALIDATION_ERROR" => Self::ValidationError,
            "PERMISSION_DENIED" => Self::PermissionDenied,
            "NOT_FOUND" => Self::NotFound,
            "CONFLICT" => Self::Conflict,
            _ => Self::Internal,
        }
    }

    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }
}

/// Failure of a single item inside a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// Identifier of the failed resource.
    pub resource_id: String,
    /// Failure classification.
    pub error_code: ErrorCode,
    /// Human-readable reason.
    pub error_message: String,
    /// Optional structured context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

/// Overall classification of a bulk result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Every item succeeded.
    Completed,
    /// Some items succeeded and some failed.
    Partial,
    /// Every requested item failed.
    Failed,
}

impl OperationStatus {
    /// Derive the status from per-item counts.
    ///
    /// `Completed` iff nothing failed, `Failed` iff something failed and nothing
    /// succeeded, `Partial` otherwise.
    #[must_use]
    pub const fn derive(success_count: u32, failed_count: u32) -> Self {
        if failed_count == 0 {
            Self::Completed
        } else if success_count == 0 {
            Self::Failed
        } else {
            Self::Partial
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Inline export payload returned when no download location is offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineExport {
    /// Base64-encoded artifact bytes.
    Encoded(String),
    /// Raw records to be rendered client-side.
    Records(Vec<Map<String, Value>>),
}

/// Export-specific details attached to an export result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReceipt {
    /// Server identifier for the export.
    pub export_id: String,
    /// Format the server produced.
    pub format: ExportFormat,
    /// Number of exported records.
    pub total_records: u32,
    /// Direct download location, when the server stored the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Inline artifact data, when the server returned it directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<InlineExport>,
}

/// Outcome of a bulk operation with per-item accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperationResult {
    /// Operation that produced this result.
    pub operation_type: OperationType,
    /// Items the result accounts for.
    pub total_requested: u32,
    /// Items that succeeded.
    pub success_count: u32,
    /// Items that failed.
    pub failed_count: u32,
    /// Identifiers the server reports as applied.
    pub updated_ids: Vec<String>,
    /// Itemised failures.
    pub errors: Vec<OperationError>,
    /// Server warnings merged with client-observed anomalies.
    pub warnings: Vec<String>,
    /// Server-side processing time.
    pub processing_time_ms: u64,
    /// Derived overall classification.
    pub status: OperationStatus,
    /// Export details for export operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportReceipt>,
}

impl BulkOperationResult {
    /// Short summary in the form `X of Y succeeded`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} of {} succeeded",
            self.success_count, self.total_requested
        )
    }

    /// True when the result contains per-item failures.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}

/// Reference to a bulk operation accepted for background processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncJobHandle {
    /// Server job identifier.
    pub job_id: String,
    /// Location or key used to query job status.
    pub poll_url_or_key: String,
    /// When the job was accepted.
    pub created_at: DateTime<Utc>,
    /// Server-suggested status query cadence.
    pub suggested_poll_interval: Option<Duration>,
    /// Operation the job is running.
    pub operation_type: OperationType,
    /// Number of targets submitted with the job.
    pub total_requested: u32,
    /// Requested format, for export jobs.
    pub export_format: Option<ExportFormat>,
}

impl AsyncJobHandle {
    /// Cadence to poll at, preferring the server's suggestion over `default`.
    #[must_use]
    pub fn poll_interval(&self, default: Duration) -> Duration {
        self.suggested_poll_interval
            .filter(|interval| !interval.is_zero())
            .unwrap_or(default)
    }
}

/// Immediate or deferred outcome of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The server processed the request synchronously.
    Immediate(BulkOperationResult),
    /// The server accepted the request for background processing.
    Accepted(AsyncJobHandle),
}

/// Lifecycle of an asynchronous job as observed by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted but not started.
    Pending,
    /// Running.
    Processing,
    /// Finished with a result.
    Completed,
    /// Finished with a job-level failure.
    Failed,
    /// The client stopped waiting before a terminal state.
    TimedOut,
}

impl JobState {
    /// True for states that end polling.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Apply a reported state, ignoring reports that would move backwards.
    #[must_use]
    pub const fn advance(self, reported: Self) -> Self {
        if self.is_terminal() || reported.rank() <= self.rank() {
            self
        } else {
            reported
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed | Self::TimedOut => 2,
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// One status query answer for an asynchronous job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusReport {
    /// Reported job state.
    pub state: JobState,
    /// Final result, present once the job completed.
    pub result: Option<BulkOperationResult>,
    /// Job-level failure reason, present when the job failed.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_derivation_follows_counts() {
        assert_eq!(OperationStatus::derive(6, 0), OperationStatus::Completed);
        assert_eq!(OperationStatus::derive(2, 1), OperationStatus::Partial);
        assert_eq!(OperationStatus::derive(0, 3), OperationStatus::Failed);
        assert_eq!(OperationStatus::derive(0, 0), OperationStatus::Completed);
    }

    #[test]
    fn export_format_parses_aliases() {
        assert_eq!("csv".parse::<ExportFormat>().ok(), Some(ExportFormat::Csv));
        assert_eq!("EXCEL".parse::<ExportFormat>().ok(), Some(ExportFormat::Excel));
        assert_eq!("xlsx".parse::<ExportFormat>().ok(), Some(ExportFormat::Excel));
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Excel.extension(), "xlsx");
    }

    #[test]
    fn unknown_error_codes_collapse_to_internal() {
        assert_eq!(ErrorCode::from_wire("conflict"), ErrorCode::Conflict);
        assert_eq!(ErrorCode::from_wire("TEAPOT"), ErrorCode::Internal);
    }

    #[test]
    fn job_state_never_moves_backwards() {
        let state = JobState::Pending.advance(JobState::Processing);
        assert_eq!(state, JobState::Processing);
        assert_eq!(state.advance(JobState::Pending), JobState::Processing);
        let done = state.advance(JobState::Completed);
        assert_eq!(done, JobState::Completed);
        assert_eq!(done.advance(JobState::Failed), JobState::Completed);
    }

    #[test]
    fn poll_interval_prefers_server_hint() {
        let mut handle = AsyncJobHandle {
            job_id: "j1".into(),
            poll_url_or_key: "/bulk/status/j1".into(),
            created_at: Utc::now(),
            suggested_poll_interval: Some(Duration::from_millis(500)),
            operation_type: OperationType::Export,
            total_requested: 2,
            export_format: Some(ExportFormat::Excel),
        };
        let default = Duration::from_secs(2);
        assert_eq!(handle.poll_interval(default), Duration::from_millis(500));
        handle.suggested_poll_interval = Some(Duration::ZERO);
        assert_eq!(handle.poll_interval(default), default);
    }
}
