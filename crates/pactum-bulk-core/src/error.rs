//! Error types for bulk orchestration.
//!
//! # Design
//! - Pre-flight errors never reach the network layer.
//! - Only transient failures are retried; everything else surfaces immediately.
//! - Partial success is a result, never an error.

use thiserror::Error;

use crate::model::OperationType;

/// Primary error type for bulk operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BulkError {
    /// The selection was empty when a request was built.
    #[error("no resources selected")]
    EmptySelection,
    /// The operation payload failed local validation.
    #[error("invalid {operation} payload: {reason}")]
    InvalidPayload {
        /// Operation whose payload was rejected.
        operation: OperationType,
        /// Description of the violation.
        reason: String,
    },
    /// The selection exceeds the configured maximum batch size.
    #[error("selection of {size} exceeds the maximum batch size of {max}")]
    BatchTooLarge {
        /// Selection size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The same selection already has a submission in flight.
    #[error("a bulk operation for this selection is already in flight")]
    SubmissionInFlight,
    /// The server rejected the request as invalid.
    #[error("request rejected (status {status}): {message}")]
    ValidationFailure {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason.
        message: String,
    },
    /// The caller is not allowed to perform the operation.
    #[error("permission denied (status {status}): {message}")]
    PermissionDenied {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason.
        message: String,
    },
    /// The endpoint or resource does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Server-provided reason.
        message: String,
    },
    /// A server or network failure that may succeed when retried.
    #[error("transient failure after {attempts} attempt(s): {message}")]
    TransientFailure {
        /// HTTP status code when a response was received.
        status: Option<u16>,
        /// Failure description.
        message: String,
        /// Attempts made before surfacing the failure.
        attempts: u32,
    },
    /// An asynchronous job did not reach a terminal state in time.
    #[error("job {job_id} did not finish within {waited_ms} ms; it may still be processing")]
    JobTimeout {
        /// Server job identifier.
        job_id: String,
        /// Time spent waiting.
        waited_ms: u64,
        /// Status queries issued.
        polls: u32,
    },
    /// An asynchronous job failed as a whole.
    #[error("job {job_id} failed: {message}")]
    JobFailed {
        /// Server job identifier.
        job_id: String,
        /// Server-reported reason.
        message: String,
    },
    /// A completed export carried nothing to deliver.
    #[error("export completed without a download location or inline data")]
    NoDeliverableData {
        /// Server export identifier when known.
        export_id: Option<String>,
    },
    /// A response did not match the expected schema.
    #[error("malformed {context} response: {detail}")]
    MalformedResponse {
        /// Boundary that produced the payload.
        context: &'static str,
        /// Parse or consistency failure.
        detail: String,
    },
}

/// Convenience alias for bulk operation results.
pub type BulkResult<T> = Result<T, BulkError>;

impl BulkError {
    /// Transient failure observed on a single attempt.
    #[must_use]
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TransientFailure {
            status,
            message: message.into(),
            attempts: 1,
        }
    }

    /// Schema violation at a response boundary.
    #[must_use]
    pub fn malformed(context: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context,
            detail: detail.into(),
        }
    }

    /// True for failures the default retry policy retries.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }

    /// True for errors raised locally before any request is sent.
    #[must_use]
    pub const fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::EmptySelection
                | Self::InvalidPayload { .. }
                | Self::BatchTooLarge { .. }
                | Self::SubmissionInFlight
        )
    }

    /// Record the number of attempts made on a transient failure.
    #[must_use]
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            Self::TransientFailure {
                status, message, ..
            } => Self::TransientFailure {
                status,
                message,
                attempts,
            },
            other => other,
        }
    }

    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EmptySelection => "empty_selection",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::SubmissionInFlight => "submission_in_flight",
            Self::ValidationFailure { .. } => "validation_failure",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotFound { .. } => "not_found",
            Self::TransientFailure { .. } => "transient_failure",
            Self::JobTimeout { .. } => "job_timeout",
            Self::JobFailed { .. } => "job_failed",
            Self::NoDeliverableData { .. } => "no_deliverable_data",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(BulkError::transient(Some(503), "unavailable").is_transient());
        assert!(
            !BulkError::ValidationFailure {
                status: 400,
                message: "bad".into()
            }
            .is_transient()
        );
        assert!(BulkError::EmptySelection.is_preflight());
    }

    #[test]
    fn with_attempts_only_touches_transient_failures() {
        let annotated = BulkError::transient(None, "connection reset").with_attempts(3);
        assert!(matches!(
            annotated,
            BulkError::TransientFailure { attempts: 3, .. }
        ));
        assert_eq!(
            annotated.to_string(),
            "transient failure after 3 attempt(s): connection reset"
        );

        let untouched = BulkError::NotFound {
            message: "missing".into(),
        }
        .with_attempts(3);
        assert_eq!(untouched.kind(), "not_found");
    }
}
