//! Property tests for request building and result reconciliation.

use pactum_bulk_core::{
    BatchRequestBuilder, BulkError, OperationIntent, OperationStatus, OperationType,
    SelectionSet, aggregate,
};
use pactum_test_support::fixtures::{activate_intent, completed_result, request};
use proptest::prelude::*;

fn arb_ids(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("c[0-9a-f]{1,8}", 1..max)
        .prop_map(|ids| ids.into_iter().collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn built_requests_preserve_selection_order(ids in arb_ids(100)) {
        let selection: SelectionSet = ids.iter().map(String::as_str).collect();
        let request = BatchRequestBuilder::default()
            .build(&selection, OperationIntent::Delete)
            .expect("non-empty selection within limits");

        prop_assert_eq!(request.target_ids(), ids.as_slice());
        prop_assert_eq!(request.operation_type(), OperationType::Delete);
    }

    #[test]
    fn oversized_selections_are_rejected(ids in arb_ids(60), max in 1_usize..30) {
        prop_assume!(ids.len() > max);
        let selection: SelectionSet = ids.iter().map(String::as_str).collect();
        let err = BatchRequestBuilder::new(max)
            .build(&selection, OperationIntent::Delete)
            .expect_err("selection exceeds the limit");

        prop_assert_eq!(err, BulkError::BatchTooLarge { size: ids.len(), max });
    }

    #[test]
    fn aggregated_counts_always_add_up(
        success in 0_u32..40,
        failed in 0_u32..40,
        reported_total in 0_u32..100,
    ) {
        let ids: Vec<String> = (1..=5).map(|index| format!("c{index}")).collect();
        let targets: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut raw = completed_result(OperationType::Update, &targets);
        raw.success_count = success;
        raw.failed_count = failed;
        raw.total_requested = reported_total;

        let result = aggregate(&request(&targets, activate_intent()), raw);

        prop_assert_eq!(result.total_requested, success + failed);
        let expected = if failed == 0 {
            OperationStatus::Completed
        } else if success == 0 {
            OperationStatus::Failed
        } else {
            OperationStatus::Partial
        };
        prop_assert_eq!(result.status, expected);
        prop_assert_eq!(
            reported_total == success + failed && success + failed == 5,
            result.warnings.iter().all(|warning| !warning.contains("add up")
                && !warning.contains("submitted ids"))
        );
    }
}
