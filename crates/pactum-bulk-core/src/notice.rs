//! User-facing summaries for bulk outcomes and failures.

use serde::Serialize;

use crate::error::BulkError;
use crate::model::{BulkOperationResult, OperationStatus};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Everything succeeded.
    Success,
    /// Partial success, a timeout, or a local problem with the request.
    Warning,
    /// Nothing succeeded or the operation could not run.
    Error,
}

/// Message shown to the user after a bulk operation settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeNotice {
    /// Severity.
    pub level: NoticeLevel,
    /// One-line headline.
    pub message: String,
    /// Itemised details, one per failed resource.
    pub items: Vec<String>,
    /// Whether a manual retry or re-check should be offered.
    pub retry_available: bool,
    /// Whether the notice can be dismissed.
    pub dismissable: bool,
}

impl OutcomeNotice {
    /// Notice for a settled result.
    #[must_use]
    pub fn for_result(result: &BulkOperationResult) -> Self {
        let items = result
            .errors
            .iter()
            .map(|error| {
                format!(
                    "{}: {} ({})",
                    error.resource_id,
                    error.error_message,
                    error.error_code.as_str()
                )
            })
            .collect();

        match result.status {
            OperationStatus::Completed => Self {
                level: NoticeLevel::Success,
                message: result.summary(),
                items,
                retry_available: false,
                dismissable: true,
            },
            OperationStatus::Partial => Self {
                level: NoticeLevel::Warning,
                message: result.summary(),
                items,
                retry_available: false,
                dismissable: true,
            },
            OperationStatus::Failed => Self {
                level: NoticeLevel::Error,
                message: format!("{} failed: {}", result.operation_type, result.summary()),
                items,
                retry_available: true,
                dismissable: true,
            },
        }
    }

    /// Notice for an operation the user stopped waiting on.
    #[must_use]
    pub fn abandoned(job_id: Option<&str>) -> Self {
        let message = job_id.map_or_else(
            || "Stopped before the server answered; the operation may still have been applied.".to_string(),
            |job_id| format!("Stopped waiting for job {job_id}; it may still be processing."),
        );
        Self {
            level: NoticeLevel::Warning,
            message,
            items: Vec::new(),
            retry_available: false,
            dismissable: true,
        }
    }

    /// Notice for an operation that ended in an error.
    #[must_use]
    pub fn for_error(error: &BulkError) -> Self {
        match error {
            BulkError::JobTimeout { job_id, .. } => Self {
                level: NoticeLevel::Warning,
                message: format!(
                    "Job {job_id} is taking longer than expected and may still be processing. Check its status again later."
                ),
                items: Vec::new(),
                retry_available: true,
                dismissable: true,
            },
            _ if error.is_preflight() => Self {
                level: NoticeLevel::Warning,
                message: error.to_string(),
                items: Vec::new(),
                retry_available: false,
                dismissable: true,
            },
            BulkError::JobFailed { .. } => Self {
                level: NoticeLevel::Error,
                message: format!("{error}. Retry the operation manually."),
                items: Vec::new(),
                retry_available: true,
                dismissable: true,
            },
            _ => Self {
                level: NoticeLevel::Error,
                message: error.to_string(),
                items: Vec::new(),
                retry_available: true,
                dismissable: true,
            },
        }
    }
}
