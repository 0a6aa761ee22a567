//! Normalises server-reported outcomes into a consistent [`BulkOperationResult`].
//!
//! # Design
//! - Accounting mismatches become warnings; they never fail the operation.
//! - Server ordering of `updated_ids` and `errors` is preserved.
//! - `status` is always re-derived from the final counts.

use std::collections::HashSet;
use std::fmt::Write as _;

use indexmap::IndexSet;

use crate::model::{
    BulkOperationRequest, BulkOperationResult, DispatchOutcome, OperationStatus, OperationType,
};

/// Number of identifiers spelled out in an anomaly warning before eliding the rest.
const LISTED_IDS: usize = 5;

/// Aggregate an immediate dispatch outcome; accepted jobs have nothing to aggregate yet.
#[must_use]
pub fn aggregate_outcome(
    request: &BulkOperationRequest,
    outcome: DispatchOutcome,
) -> Option<BulkOperationResult> {
    match outcome {
        DispatchOutcome::Immediate(result) => Some(aggregate(request, result)),
        DispatchOutcome::Accepted(_) => None,
    }
}

/// Reconcile `result` against the request that produced it.
#[must_use]
pub fn aggregate(
    request: &BulkOperationRequest,
    mut result: BulkOperationResult,
) -> BulkOperationResult {
    let mut anomalies = Vec::new();

    if result.operation_type != request.operation_type() {
        anomalies.push(format!(
            "server reported a {} result for a {} request",
            result.operation_type,
            request.operation_type()
        ));
        result.operation_type = request.operation_type();
    }

    let counted = result.success_count.saturating_add(result.failed_count);
    if counted != result.total_requested {
        anomalies.push(format!(
            "server counts do not add up: {} succeeded + {} failed != {} requested",
            result.success_count, result.failed_count, result.total_requested
        ));
        result.total_requested = counted;
    }

    let submitted = request.target_count();
    if result.total_requested != submitted {
        anomalies.push(format!(
            "server accounted for {} of {} submitted ids",
            result.total_requested, submitted
        ));
    }

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    result.updated_ids.retain(|id| {
        if seen.insert(id.clone()) {
            true
        } else {
            duplicates.push(id.clone());
            false
        }
    });
    if !duplicates.is_empty() {
        anomalies.push(format!(
            "server listed {} id(s) more than once: {}",
            duplicates.len(),
            list_ids(duplicates.iter().map(String::as_str))
        ));
    }

    let targets: HashSet<&str> = request.target_ids().iter().map(String::as_str).collect();
    let errored: HashSet<&str> = result
        .errors
        .iter()
        .map(|error| error.resource_id.as_str())
        .collect();

    let unexpected: IndexSet<&str> = result
        .updated_ids
        .iter()
        .chain(result.errors.iter().map(|error| &error.resource_id))
        .map(String::as_str)
        .filter(|id| !targets.contains(id))
        .collect();
    if !unexpected.is_empty() {
        anomalies.push(format!(
            "server reported {} id(s) that were not submitted: {}",
            unexpected.len(),
            list_ids(unexpected.iter().copied())
        ));
    }

    if tracks_updated_ids(result.operation_type) {
        let updated: HashSet<&str> = result.updated_ids.iter().map(String::as_str).collect();
        let unaccounted: Vec<String> = request
            .target_ids()
            .iter()
            .filter(|id| !updated.contains(id.as_str()) && !errored.contains(id.as_str()))
            .cloned()
            .collect();
        if !unaccounted.is_empty() {
            anomalies.push(format!(
                "{} submitted id(s) were neither updated nor reported as errors: {}",
                unaccounted.len(),
                list_ids(unaccounted.iter().map(String::as_str))
            ));
        }
    }

    result.status = OperationStatus::derive(result.success_count, result.failed_count);

    for anomaly in anomalies {
        tracing::warn!(operation = %result.operation_type, anomaly = %anomaly, "bulk result anomaly");
        if !result.warnings.contains(&anomaly) {
            result.warnings.push(anomaly);
        }
    }

    result
}

const fn tracks_updated_ids(operation: OperationType) -> bool {
    matches!(operation, OperationType::Update | OperationType::Delete)
}

fn list_ids<'a>(ids: impl ExactSizeIterator<Item = &'a str>) -> String {
    let total = ids.len();
    let mut listed = ids.take(LISTED_IDS).collect::<Vec<_>>().join(", ");
    if total > LISTED_IDS {
        let _ = write!(listed, ", and {} more", total - LISTED_IDS);
    }
    listed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BatchRequestBuilder, OperationIntent};
    use crate::model::{ErrorCode, FieldUpdates, OperationError};
    use crate::selection::SelectionSet;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn update_request(ids: &[&str]) -> BulkOperationRequest {
        let mut updates = FieldUpdates::new();
        updates.insert("status".into(), json!("ACTIVE"));
        let selection: SelectionSet = ids.iter().copied().collect();
        BatchRequestBuilder::default()
            .build(&selection, OperationIntent::Update(updates))
            .expect("valid request")
    }

    fn result(total: u32, success: u32, failed: u32, updated: &[&str]) -> BulkOperationResult {
        BulkOperationResult {
            operation_type: OperationType::Update,
            total_requested: total,
            success_count: success,
            failed_count: failed,
            updated_ids: updated.iter().map(|id| (*id).to_string()).collect(),
            errors: Vec::new(),
            warnings: Vec::new(),
            processing_time_ms: 40,
            status: OperationStatus::Completed,
            export: None,
        }
    }

    #[test]
    fn full_success_is_completed_without_warnings() {
        let ids = ["c1", "c2", "c3", "c4", "c5", "c6"];
        let request = update_request(&ids);
        let aggregated = aggregate(&request, result(6, 6, 0, &ids));
        assert_eq!(aggregated.status, OperationStatus::Completed);
        assert!(aggregated.warnings.is_empty());
    }

    #[test]
    fn itemised_failure_yields_partial() {
        let request = update_request(&["c1", "c2", "c3"]);
        let mut raw = result(3, 2, 1, &["c1", "c2"]);
        raw.errors.push(OperationError {
            resource_id: "c3".into(),
            error_code: ErrorCode::ValidationError,
            error_message: "Cannot update contract in current status".into(),
            details: BTreeMap::new(),
        });

        let aggregated = aggregate(&request, raw);
        assert_eq!(aggregated.status, OperationStatus::Partial);
        assert_eq!(aggregated.errors.len(), 1);
        assert!(aggregated.warnings.is_empty());
        assert_eq!(aggregated.summary(), "2 of 3 succeeded");
    }

    #[test]
    fn unaccounted_ids_become_a_warning() {
        let request = update_request(&["c1", "c2", "c3"]);
        let aggregated = aggregate(&request, result(3, 3, 0, &["c1", "c3"]));
        assert_eq!(aggregated.status, OperationStatus::Completed);
        assert_eq!(aggregated.warnings.len(), 1);
        assert!(aggregated.warnings[0].contains("c2"));
    }

    #[test]
    fn ids_missing_from_a_total_failure_are_reported() {
        let request = update_request(&["c1", "c2", "c3"]);
        let mut raw = result(3, 0, 3, &[]);
        raw.errors.push(OperationError {
            resource_id: "c2".into(),
            error_code: ErrorCode::PermissionDenied,
            error_message: "Contract is locked".into(),
            details: BTreeMap::new(),
        });

        let aggregated = aggregate(&request, raw);
        assert_eq!(aggregated.status, OperationStatus::Failed);
        assert_eq!(
            aggregated.warnings,
            vec!["2 submitted id(s) were neither updated nor reported as errors: c1, c3"]
        );
    }

    #[test]
    fn foreign_ids_are_listed_in_server_order() {
        let request = update_request(&["c1"]);
        let mut raw = result(1, 1, 0, &["c1", "z9", "a4", "m2"]);
        raw.errors.push(OperationError {
            resource_id: "b7".into(),
            error_code: ErrorCode::NotFound,
            error_message: "Contract not found".into(),
            details: BTreeMap::new(),
        });

        let aggregated = aggregate(&request, raw);
        assert_eq!(
            aggregated.warnings,
            vec!["server reported 4 id(s) that were not submitted: z9, a4, m2, b7"]
        );
    }

    #[test]
    fn inconsistent_counts_are_repaired() {
        let request = update_request(&["c1", "c2"]);
        let aggregated = aggregate(&request, result(5, 0, 2, &[]));
        assert_eq!(aggregated.total_requested, 2);
        assert_eq!(aggregated.status, OperationStatus::Failed);
        assert!(!aggregated.warnings.is_empty());
    }

    #[test]
    fn duplicate_and_foreign_ids_are_reported_in_order() {
        let request = update_request(&["c2", "c1"]);
        let aggregated = aggregate(&request, result(2, 2, 0, &["c2", "c9", "c2", "c1"]));
        assert_eq!(aggregated.updated_ids, vec!["c2", "c9", "c1"]);
        assert_eq!(aggregated.warnings.len(), 2);
    }

    #[test]
    fn server_warnings_are_kept_first() {
        let request = update_request(&["c1"]);
        let mut raw = result(1, 1, 0, &["c1"]);
        raw.warnings.push("index rebuild pending".into());
        let aggregated = aggregate(&request, raw);
        assert_eq!(aggregated.warnings, vec!["index rebuild pending"]);
    }

    #[test]
    fn accepted_outcomes_have_nothing_to_aggregate() {
        let request = update_request(&["c1"]);
        let handle = crate::model::AsyncJobHandle {
            job_id: "j1".into(),
            poll_url_or_key: "/bulk/status/j1".into(),
            created_at: chrono::Utc::now(),
            suggested_poll_interval: None,
            operation_type: OperationType::Update,
            total_requested: 1,
            export_format: None,
        };
        assert!(aggregate_outcome(&request, DispatchOutcome::Accepted(handle)).is_none());
    }
}
