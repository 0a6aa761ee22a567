//! Sample selections, requests, results, and job handles.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use pactum_bulk_core::{
    AsyncJobHandle, BatchRequestBuilder, BulkOperationRequest, BulkOperationResult, ErrorCode,
    ExportFormat, ExportReceipt, ExportSpec, FieldUpdates, FixedKeySource, JobState,
    JobStatusReport, OperationError, OperationIntent, OperationStatus, OperationType,
    SelectionSet,
};
use serde_json::json;

/// Idempotency key stamped on requests built by [`request`].
pub const FIXTURE_KEY: &str = "fixture-idempotency-key";

/// Selection containing `ids` in order.
#[must_use]
pub fn selection(ids: &[&str]) -> SelectionSet {
    ids.iter().copied().collect()
}

/// `c1` through `c{count}`.
#[must_use]
pub fn contract_ids(count: usize) -> Vec<String> {
    (1..=count).map(|index| format!("c{index}")).collect()
}

/// Update intent setting `status` to `ACTIVE`.
#[must_use]
pub fn activate_intent() -> OperationIntent {
    let mut updates = FieldUpdates::new();
    updates.insert("status".into(), json!("ACTIVE"));
    OperationIntent::Update(updates)
}

/// Export intent for `title` and `status`.
#[must_use]
pub fn export_intent(format: ExportFormat) -> OperationIntent {
    OperationIntent::Export(ExportSpec {
        format,
        fields: vec!["title".into(), "status".into()],
        include_metadata: false,
    })
}

/// Request over `ids` built with a fixed idempotency key.
///
/// # Panics
///
/// Panics when `ids` is empty or the intent is invalid.
#[must_use]
pub fn request(ids: &[&str], intent: OperationIntent) -> BulkOperationRequest {
    BatchRequestBuilder::default()
        .with_key_source(FixedKeySource(FIXTURE_KEY.into()))
        .build(&selection(ids), intent)
        .expect("fixture request must be valid")
}

/// Result where every id in `ids` succeeded.
#[must_use]
pub fn completed_result(operation: OperationType, ids: &[&str]) -> BulkOperationResult {
    let total = u32::try_from(ids.len()).unwrap_or(u32::MAX);
    BulkOperationResult {
        operation_type: operation,
        total_requested: total,
        success_count: total,
        failed_count: 0,
        updated_ids: if operation == OperationType::Export {
            Vec::new()
        } else {
            ids.iter().map(|id| (*id).to_string()).collect()
        },
        errors: Vec::new(),
        warnings: Vec::new(),
        processing_time_ms: 25,
        status: OperationStatus::Completed,
        export: None,
    }
}

/// Result where `succeeded` ids were applied and `failed` ids were rejected.
#[must_use]
pub fn partial_result(
    operation: OperationType,
    succeeded: &[&str],
    failed: &[(&str, ErrorCode, &str)],
) -> BulkOperationResult {
    let success = u32::try_from(succeeded.len()).unwrap_or(u32::MAX);
    let failures = u32::try_from(failed.len()).unwrap_or(u32::MAX);
    BulkOperationResult {
        operation_type: operation,
        total_requested: success + failures,
        success_count: success,
        failed_count: failures,
        updated_ids: succeeded.iter().map(|id| (*id).to_string()).collect(),
        errors: failed
            .iter()
            .map(|(id, code, message)| item_error(id, *code, message))
            .collect(),
        warnings: Vec::new(),
        processing_time_ms: 25,
        status: OperationStatus::derive(success, failures),
        export: None,
    }
}

/// Itemised failure for `id`.
#[must_use]
pub fn item_error(id: &str, code: ErrorCode, message: &str) -> OperationError {
    OperationError {
        resource_id: id.to_string(),
        error_code: code,
        error_message: message.to_string(),
        details: BTreeMap::new(),
    }
}

/// Completed export result pointing at `download_url`.
#[must_use]
pub fn export_result(format: ExportFormat, ids: &[&str], download_url: &str) -> BulkOperationResult {
    let mut result = completed_result(OperationType::Export, ids);
    result.export = Some(ExportReceipt {
        export_id: "e1".into(),
        format,
        total_records: result.total_requested,
        download_url: Some(download_url.to_string()),
        inline: None,
    });
    result
}

/// Handle for an accepted job with no server interval hint.
#[must_use]
pub fn job_handle(job_id: &str, operation: OperationType, total: u32) -> AsyncJobHandle {
    AsyncJobHandle {
        job_id: job_id.to_string(),
        poll_url_or_key: format!("/bulk/status/{job_id}"),
        created_at: Utc::now(),
        suggested_poll_interval: None,
        operation_type: operation,
        total_requested: total,
        export_format: (operation == OperationType::Export).then_some(ExportFormat::Csv),
    }
}

/// Handle with an explicit poll interval hint.
#[must_use]
pub fn job_handle_with_interval(
    job_id: &str,
    operation: OperationType,
    total: u32,
    interval: Duration,
) -> AsyncJobHandle {
    AsyncJobHandle {
        suggested_poll_interval: Some(interval),
        ..job_handle(job_id, operation, total)
    }
}

/// Non-terminal status report.
#[must_use]
pub const fn in_progress(state: JobState) -> JobStatusReport {
    JobStatusReport {
        state,
        result: None,
        error: None,
    }
}

/// Completed status report carrying `result`.
#[must_use]
pub const fn completed(result: BulkOperationResult) -> JobStatusReport {
    JobStatusReport {
        state: JobState::Completed,
        result: Some(result),
        error: None,
    }
}

/// Failed status report with `reason`.
#[must_use]
pub fn failed(reason: &str) -> JobStatusReport {
    JobStatusReport {
        state: JobState::Failed,
        result: None,
        error: Some(reason.to_string()),
    }
}
