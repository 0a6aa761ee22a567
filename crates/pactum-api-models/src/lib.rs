#![forbid(unsafe_code)]
#![deny(
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery)]
//! Wire DTOs for the Pactum bulk operations API.
//!
//! Responses are parsed into these types once at the HTTP boundary and then
//! converted into the transport-agnostic values of `pactum-bulk-core`. Any
//! shape that cannot be converted becomes [`BulkError::MalformedResponse`].

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use pactum_bulk_core::{
    AsyncJobHandle, BulkError, BulkOperationRequest, BulkOperationResult, BulkResult, ErrorCode,
    ExportFormat, ExportReceipt, FieldUpdates, InlineExport, JobState, JobStatusReport,
    OperationError, OperationPayload, OperationStatus, OperationType,
};

/// RFC9457-compatible problem document returned on request failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type", default)]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
}

impl ProblemDetails {
    /// Most specific message the document offers.
    #[must_use]
    pub fn message(&self) -> &str {
        self.detail
            .as_deref()
            .filter(|detail| !detail.trim().is_empty())
            .unwrap_or(&self.title)
    }
}

/// Body of `POST /bulk/{resource}/update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkUpdateBody {
    /// Targets in selection order.
    pub contract_ids: Vec<String>,
    /// Ordered field updates.
    pub updates: FieldUpdates,
}

/// Body of `POST /bulk/{resource}/delete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkDeleteBody {
    /// Targets in selection order.
    pub contract_ids: Vec<String>,
}

/// Body of `POST /bulk/{resource}/export`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkExportBody {
    /// Targets in selection order.
    pub contract_ids: Vec<String>,
    /// Requested artifact format.
    pub format: ExportFormat,
    /// Ordered field list.
    pub fields: Vec<String>,
    /// Whether metadata columns are appended.
    pub include_metadata: bool,
}

/// Request body for any bulk operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum BulkRequestBody {
    /// Field updates.
    Update(BulkUpdateBody),
    /// Deletion.
    Delete(BulkDeleteBody),
    /// Export.
    Export(BulkExportBody),
}

impl From<&BulkOperationRequest> for BulkRequestBody {
    fn from(request: &BulkOperationRequest) -> Self {
        let contract_ids = request.target_ids().to_vec();
        match request.payload() {
            OperationPayload::UpdateFields(updates) => Self::Update(BulkUpdateBody {
                contract_ids,
                updates: updates.clone(),
            }),
            OperationPayload::DeleteConfirmation(_) => Self::Delete(BulkDeleteBody { contract_ids }),
            OperationPayload::ExportSpec(spec) => Self::Export(BulkExportBody {
                contract_ids,
                format: spec.format,
                fields: spec.fields.clone(),
                include_metadata: spec.include_metadata,
            }),
        }
    }
}

/// Itemised failure as sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationErrorBody {
    /// Failed resource.
    pub resource_id: String,
    /// Wire error code; unknown codes are treated as internal errors.
    pub error_code: String,
    /// Human-readable reason.
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    /// Optional structured context.
    pub details: Map<String, Value>,
}

impl From<OperationErrorBody> for OperationError {
    fn from(body: OperationErrorBody) -> Self {
        let details: BTreeMap<String, String> = body
            .details
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();
        Self {
            resource_id: body.resource_id,
            error_code: ErrorCode::from_wire(&body.error_code),
            error_message: body.error_message,
            details,
        }
    }
}

/// Synchronous result of an update or delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkResultBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Operation the server believes it ran.
    pub operation_type: Option<OperationType>,
    /// Items the server accounted for.
    pub total_requested: u32,
    /// Items that succeeded.
    pub success_count: u32,
    /// Items that failed.
    pub failed_count: u32,
    #[serde(default)]
    /// Identifiers applied.
    pub updated_ids: Vec<String>,
    #[serde(default)]
    /// Itemised failures.
    pub errors: Vec<OperationErrorBody>,
    #[serde(default)]
    /// Server warnings.
    pub warnings: Vec<String>,
    #[serde(default)]
    /// Server processing time.
    pub processing_time_ms: u64,
}

impl BulkResultBody {
    /// Convert into a core result; `status` is derived from the counts.
    #[must_use]
    pub fn into_result(self, operation: OperationType) -> BulkOperationResult {
        BulkOperationResult {
            operation_type: self.operation_type.unwrap_or(operation),
            total_requested: self.total_requested,
            success_count: self.success_count,
            failed_count: self.failed_count,
            updated_ids: self.updated_ids,
            errors: self.errors.into_iter().map(OperationError::from).collect(),
            warnings: self.warnings,
            processing_time_ms: self.processing_time_ms,
            status: OperationStatus::derive(self.success_count, self.failed_count),
            export: None,
        }
    }
}

/// Synchronous export response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportResponseBody {
    /// Server export identifier.
    pub export_id: String,
    /// Produced format.
    pub format: String,
    /// Exported record count.
    pub total_records: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Direct download location.
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Base64-encoded artifact.
    pub content_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Raw records for client-side rendering.
    pub records: Option<Vec<Map<String, Value>>>,
}

impl ExportResponseBody {
    /// Convert into a core result carrying an export receipt.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::MalformedResponse`] for an unknown format.
    pub fn into_result(self) -> BulkResult<BulkOperationResult> {
        let format: ExportFormat = self
            .format
            .parse()
            .map_err(|_| BulkError::malformed("export", format!("unknown format '{}'", self.format)))?;
        let inline = self
            .content_base64
            .map(InlineExport::Encoded)
            .or_else(|| self.records.map(InlineExport::Records));

        Ok(export_result(ExportReceipt {
            export_id: self.export_id,
            format,
            total_records: self.total_records,
            download_url: self.download_url,
            inline,
        }))
    }
}

/// `202 Accepted` job descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobAcceptedBody {
    /// Server job identifier.
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Status location; defaults to `/bulk/status/{job_id}`.
    pub poll_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Suggested poll cadence.
    pub poll_interval_ms: Option<u64>,
}

impl JobAcceptedBody {
    /// Convert into a handle for the job started by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::MalformedResponse`] when the job id is blank.
    pub fn into_handle(
        self,
        request: &BulkOperationRequest,
        created_at: DateTime<Utc>,
    ) -> BulkResult<AsyncJobHandle> {
        let job_id = self.job_id.trim().to_string();
        if job_id.is_empty() {
            return Err(BulkError::malformed("dispatch", "accepted job without a job_id"));
        }
        let poll_url_or_key = self
            .poll_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| default_status_path(&job_id));

        Ok(AsyncJobHandle {
            job_id,
            poll_url_or_key,
            created_at,
            suggested_poll_interval: self.poll_interval_ms.map(Duration::from_millis),
            operation_type: request.operation_type(),
            total_requested: request.target_count(),
            export_format: request.export_spec().map(|spec| spec.format),
        })
    }
}

/// Status path used when the server does not name one.
#[must_use]
pub fn default_status_path(job_id: &str) -> String {
    format!("/bulk/status/{job_id}")
}

/// Job status document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusBody {
    /// `pending`, `processing`, `completed`, or `failed`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Final result once completed.
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Download location for completed exports.
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Export identifier for completed exports.
    pub export_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Job-level failure reason.
    pub error: Option<String>,
}

impl JobStatusBody {
    /// Convert into a status report for `handle`.
    ///
    /// Completed exports may describe their artifact through top-level
    /// `download_url`/`export_id` instead of a nested result.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::MalformedResponse`] for unknown states or result
    /// bodies that do not match the operation.
    pub fn into_report(self, handle: &AsyncJobHandle) -> BulkResult<JobStatusReport> {
        let state = parse_job_state(&self.status)?;
        if state != JobState::Completed {
            return Ok(JobStatusReport {
                state,
                result: None,
                error: self.error,
            });
        }

        let result = match handle.operation_type {
            OperationType::Export => Some(self.completed_export(handle)?),
            operation => self
                .result
                .map(|value| parse::<BulkResultBody>("job status", value))
                .transpose()?
                .map(|body| body.into_result(operation)),
        };

        Ok(JobStatusReport {
            state,
            result,
            error: None,
        })
    }

    fn completed_export(self, handle: &AsyncJobHandle) -> BulkResult<BulkOperationResult> {
        let placeholder = |total_records| ExportReceipt {
            export_id: String::new(),
            format: handle.export_format.unwrap_or(ExportFormat::Csv),
            total_records,
            download_url: None,
            inline: None,
        };

        let mut result = match self.result {
            Some(value) if value.get("export_id").is_some() => {
                parse::<ExportResponseBody>("job status", value)?.into_result()?
            }
            Some(value) => {
                parse::<BulkResultBody>("job status", value)?.into_result(OperationType::Export)
            }
            None => export_result(placeholder(handle.total_requested)),
        };

        let exported = result.success_count;
        let receipt = result.export.get_or_insert_with(|| placeholder(exported));
        if receipt.download_url.is_none() {
            receipt.download_url = self.download_url;
        }
        if receipt.export_id.is_empty() {
            receipt.export_id = self.export_id.unwrap_or_else(|| handle.job_id.clone());
        }
        Ok(result)
    }
}

fn export_result(receipt: ExportReceipt) -> BulkOperationResult {
    BulkOperationResult {
        operation_type: OperationType::Export,
        total_requested: receipt.total_records,
        success_count: receipt.total_records,
        failed_count: 0,
        updated_ids: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
        processing_time_ms: 0,
        status: OperationStatus::Completed,
        export: Some(receipt),
    }
}

/// Parse a wire job state; matching is case-insensitive.
///
/// # Errors
///
/// Returns [`BulkError::MalformedResponse`] for unknown states.
pub fn parse_job_state(status: &str) -> BulkResult<JobState> {
    match status.trim().to_ascii_lowercase().as_str() {
        "pending" => Ok(JobState::Pending),
        "processing" => Ok(JobState::Processing),
        "completed" => Ok(JobState::Completed),
        "failed" => Ok(JobState::Failed),
        other => Err(BulkError::malformed(
            "job status",
            format!("unknown job status '{other}'"),
        )),
    }
}

/// Decode `value` into `T`, reporting failures as malformed responses.
///
/// # Errors
///
/// Returns [`BulkError::MalformedResponse`] when `value` does not match `T`.
pub fn parse<T: DeserializeOwned>(context: &'static str, value: Value) -> BulkResult<T> {
    serde_json::from_value(value).map_err(|err| BulkError::malformed(context, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactum_bulk_core::{BatchRequestBuilder, ExportSpec, OperationIntent, SelectionSet};
    use serde_json::json;

    fn request(intent: OperationIntent) -> BulkOperationRequest {
        let selection: SelectionSet = ["c2", "c1"].into_iter().collect();
        BatchRequestBuilder::default()
            .build(&selection, intent)
            .expect("valid request")
    }

    fn excel_export() -> OperationIntent {
        OperationIntent::Export(ExportSpec {
            format: ExportFormat::Excel,
            fields: vec!["title".into()],
            include_metadata: true,
        })
    }

    #[test]
    fn request_bodies_follow_the_wire_contract() {
        let mut updates = FieldUpdates::new();
        updates.insert("status".into(), json!("ACTIVE"));
        let update = serde_json::to_value(BulkRequestBody::from(&request(
            OperationIntent::Update(updates),
        )))
        .expect("serialise update");
        assert_eq!(
            update,
            json!({"contract_ids": ["c2", "c1"], "updates": {"status": "ACTIVE"}})
        );

        let export = serde_json::to_value(BulkRequestBody::from(&request(excel_export())))
            .expect("serialise export");
        assert_eq!(
            export,
            json!({
                "contract_ids": ["c2", "c1"],
                "format": "EXCEL",
                "fields": ["title"],
                "include_metadata": true
            })
        );

        let delete = serde_json::to_value(BulkRequestBody::from(&request(OperationIntent::Delete)))
            .expect("serialise delete");
        assert_eq!(delete, json!({"contract_ids": ["c2", "c1"]}));
    }

    #[test]
    fn result_body_derives_status_and_maps_codes() {
        let body: BulkResultBody = serde_json::from_value(json!({
            "total_requested": 3,
            "success_count": 2,
            "failed_count": 1,
            "updated_ids": ["c1", "c2"],
            "errors": [{
                "resource_id": "c3",
                "error_code": "LOCKED_BY_WORKFLOW",
                "error_message": "Contract is locked",
                "details": {"workflow": "approval", "step": 2}
            }]
        }))
        .expect("parse result body");

        let result = body.into_result(OperationType::Update);
        assert_eq!(result.status, OperationStatus::Partial);
        assert_eq!(result.errors[0].error_code, ErrorCode::Internal);
        assert_eq!(result.errors[0].details.get("step").map(String::as_str), Some("2"));
        assert_eq!(result.processing_time_ms, 0);
    }

    #[test]
    fn accepted_body_defaults_poll_location() {
        let handle = JobAcceptedBody {
            job_id: "j1".into(),
            poll_url: None,
            poll_interval_ms: Some(500),
        }
        .into_handle(&request(excel_export()), Utc::now())
        .expect("valid handle");

        assert_eq!(handle.poll_url_or_key, "/bulk/status/j1");
        assert_eq!(handle.suggested_poll_interval, Some(Duration::from_millis(500)));
        assert_eq!(handle.total_requested, 2);
        assert_eq!(handle.export_format, Some(ExportFormat::Excel));

        let blank = JobAcceptedBody {
            job_id: "  ".into(),
            poll_url: None,
            poll_interval_ms: None,
        }
        .into_handle(&request(OperationIntent::Delete), Utc::now());
        assert!(matches!(blank, Err(BulkError::MalformedResponse { .. })));
    }

    #[test]
    fn completed_export_status_uses_top_level_download_url() {
        let handle = JobAcceptedBody {
            job_id: "j1".into(),
            poll_url: None,
            poll_interval_ms: None,
        }
        .into_handle(&request(excel_export()), Utc::now())
        .expect("valid handle");
        let body: JobStatusBody = serde_json::from_value(json!({
            "status": "completed",
            "download_url": "https://files.example/e9.xlsx",
            "export_id": "e9"
        }))
        .expect("parse status");

        let report = body.into_report(&handle).expect("valid report");
        let result = report.result.expect("completed result");
        let receipt = result.export.expect("receipt");
        assert_eq!(receipt.export_id, "e9");
        assert_eq!(receipt.format, ExportFormat::Excel);
        assert_eq!(receipt.download_url.as_deref(), Some("https://files.example/e9.xlsx"));
        assert_eq!(result.success_count, 2);
    }

    #[test]
    fn export_response_prefers_encoded_content() {
        let body: ExportResponseBody = serde_json::from_value(json!({
            "export_id": "e1",
            "format": "csv",
            "total_records": 1,
            "content_base64": "dGl0bGUK",
            "records": [{"title": "ignored"}]
        }))
        .expect("parse export");
        let result = body.into_result().expect("known format");
        let receipt = result.export.expect("receipt");
        assert_eq!(receipt.format, ExportFormat::Csv);
        assert_eq!(receipt.inline, Some(InlineExport::Encoded("dGl0bGUK".into())));
    }

    #[test]
    fn unknown_job_states_are_malformed() {
        assert_eq!(parse_job_state("PROCESSING").ok(), Some(JobState::Processing));
        assert!(matches!(
            parse_job_state("paused"),
            Err(BulkError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn problem_details_prefer_detail_over_title() {
        let problem: ProblemDetails = serde_json::from_value(json!({
            "title": "Unprocessable Entity",
            "status": 422,
            "detail": "status ARCHIVED is not allowed"
        }))
        .expect("parse problem");
        assert_eq!(problem.message(), "status ARCHIVED is not allowed");
        assert_eq!(problem.kind, "");
    }
}
