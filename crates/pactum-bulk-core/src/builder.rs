//! Turns a selection plus an operation intent into a validated request.

use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::error::{BulkError, BulkResult};
use crate::model::{
    BulkOperationRequest, ExportSpec, FieldUpdates, MAX_BATCH_SIZE, OperationPayload,
    OperationType,
};
use crate::selection::SelectionSet;

const IDEMPOTENCY_KEY_LEN: usize = 32;

/// What the caller wants to do with the selection.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationIntent {
    /// Update the given fields on every target.
    Update(FieldUpdates),
    /// Delete every target.
    Delete,
    /// Export every target.
    Export(ExportSpec),
}

/// Source of idempotency keys for newly built requests.
pub trait IdempotencyKeySource: Send + Sync {
    /// Produce the key for the next logical submission.
    fn next_key(&self) -> String;
}

/// Fresh random alphanumeric key per build.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeySource;

impl IdempotencyKeySource for RandomKeySource {
    fn next_key(&self) -> String {
        let mut rng = rand::rng();
        std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
            .take(IDEMPOTENCY_KEY_LEN)
            .collect()
    }
}

/// Always yields the same key; used to resubmit a known logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedKeySource(pub String);

impl IdempotencyKeySource for FixedKeySource {
    fn next_key(&self) -> String {
        self.0.clone()
    }
}

/// Builds [`BulkOperationRequest`] values from selections.
pub struct BatchRequestBuilder {
    max_batch_size: usize,
    keys: Box<dyn IdempotencyKeySource>,
}

impl fmt::Debug for BatchRequestBuilder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BatchRequestBuilder")
            .field("max_batch_size", &self.max_batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for BatchRequestBuilder {
    fn default() -> Self {
        Self::new(MAX_BATCH_SIZE)
    }
}

impl BatchRequestBuilder {
    /// Builder enforcing `max_batch_size` and generating random keys.
    #[must_use]
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            keys: Box::new(RandomKeySource),
        }
    }

    /// Replace the idempotency key source.
    #[must_use]
    pub fn with_key_source(mut self, keys: impl IdempotencyKeySource + 'static) -> Self {
        self.keys = Box::new(keys);
        self
    }

    /// Maximum number of targets accepted per request.
    #[must_use]
    pub const fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Validate the intent and snapshot the selection into a request.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::EmptySelection`] for an empty selection,
    /// [`BulkError::BatchTooLarge`] when the selection exceeds the batch limit,
    /// and [`BulkError::InvalidPayload`] when the intent is incomplete.
    pub fn build(
        &self,
        selection: &SelectionSet,
        intent: OperationIntent,
    ) -> BulkResult<BulkOperationRequest> {
        if selection.is_empty() {
            return Err(BulkError::EmptySelection);
        }
        if selection.size() > self.max_batch_size {
            return Err(BulkError::BatchTooLarge {
                size: selection.size(),
                max: self.max_batch_size,
            });
        }

        let payload = validate_intent(intent)?;
        let request = BulkOperationRequest::new(
            selection.to_ordered_list(),
            payload,
            self.keys.next_key(),
        );
        tracing::debug!(
            operation = %request.operation_type(),
            targets = request.target_ids().len(),
            "built bulk request"
        );
        Ok(request)
    }
}

fn validate_intent(intent: OperationIntent) -> BulkResult<OperationPayload> {
    match intent {
        OperationIntent::Update(updates) => {
            if updates.is_empty() {
                return Err(invalid(
                    OperationType::Update,
                    "at least one field must be updated",
                ));
            }
            if updates.keys().any(|field| field.trim().is_empty()) {
                return Err(invalid(
                    OperationType::Update,
                    "field names must not be blank",
                ));
            }
            Ok(OperationPayload::UpdateFields(updates))
        }
        OperationIntent::Delete => Ok(OperationPayload::DeleteConfirmation(true)),
        OperationIntent::Export(spec) => {
            if spec.fields.is_empty() {
                return Err(invalid(
                    OperationType::Export,
                    "at least one field must be exported",
                ));
            }
            let mut seen = HashSet::new();
            for field in &spec.fields {
                if field.trim().is_empty() {
                    return Err(invalid(
                        OperationType::Export,
                        "field names must not be blank",
                    ));
                }
                if !seen.insert(field.as_str()) {
                    return Err(invalid(
                        OperationType::Export,
                        format!("field '{field}' is listed more than once"),
                    ));
                }
            }
            Ok(OperationPayload::ExportSpec(spec))
        }
    }
}

fn invalid(operation: OperationType, reason: impl Into<String>) -> BulkError {
    BulkError::InvalidPayload {
        operation,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExportFormat;
    use serde_json::json;

    fn selection(ids: &[&str]) -> SelectionSet {
        ids.iter().copied().collect()
    }

    fn status_update() -> OperationIntent {
        let mut updates = FieldUpdates::new();
        updates.insert("status".into(), json!("ACTIVE"));
        OperationIntent::Update(updates)
    }

    #[test]
    fn build_preserves_selection_order() {
        let builder = BatchRequestBuilder::default();
        let request = builder
            .build(&selection(&["c3", "c1", "c2"]), status_update())
            .expect("valid request");
        assert_eq!(request.target_ids(), ["c3", "c1", "c2"]);
        assert_eq!(request.operation_type(), OperationType::Update);
        assert_eq!(request.idempotency_key().len(), IDEMPOTENCY_KEY_LEN);
    }

    #[test]
    fn each_build_gets_a_fresh_key_unless_fixed() {
        let ids = selection(&["c1"]);
        let random = BatchRequestBuilder::default();
        let first = random.build(&ids, OperationIntent::Delete).expect("first");
        let second = random.build(&ids, OperationIntent::Delete).expect("second");
        assert_ne!(first.idempotency_key(), second.idempotency_key());

        let fixed =
            BatchRequestBuilder::default().with_key_source(FixedKeySource("k-1".into()));
        let replay = fixed.build(&ids, OperationIntent::Delete).expect("replay");
        assert_eq!(replay.idempotency_key(), "k-1");
        assert_eq!(
            replay.payload(),
            &OperationPayload::DeleteConfirmation(true)
        );
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = BatchRequestBuilder::default()
            .build(&SelectionSet::new(), OperationIntent::Delete)
            .expect_err("empty selection");
        assert_eq!(err, BulkError::EmptySelection);
    }

    #[test]
    fn oversize_selection_is_rejected() {
        let err = BatchRequestBuilder::new(2)
            .build(&selection(&["a", "b", "c"]), OperationIntent::Delete)
            .expect_err("too large");
        assert_eq!(err, BulkError::BatchTooLarge { size: 3, max: 2 });
    }

    #[test]
    fn update_requires_fields() {
        let err = BatchRequestBuilder::default()
            .build(
                &selection(&["c1"]),
                OperationIntent::Update(FieldUpdates::new()),
            )
            .expect_err("empty update");
        assert!(matches!(
            err,
            BulkError::InvalidPayload {
                operation: OperationType::Update,
                ..
            }
        ));
    }

    #[test]
    fn export_requires_unique_fields() {
        let builder = BatchRequestBuilder::default();
        let ids = selection(&["c1"]);
        let empty = builder.build(
            &ids,
            OperationIntent::Export(ExportSpec {
                format: ExportFormat::Csv,
                fields: Vec::new(),
                include_metadata: false,
            }),
        );
        assert!(matches!(empty, Err(BulkError::InvalidPayload { .. })));

        let duplicated = builder.build(
            &ids,
            OperationIntent::Export(ExportSpec {
                format: ExportFormat::Json,
                fields: vec!["title".into(), "title".into()],
                include_metadata: false,
            }),
        );
        assert!(matches!(duplicated, Err(BulkError::InvalidPayload { .. })));

        let ok = builder
            .build(
                &ids,
                OperationIntent::Export(ExportSpec {
                    format: ExportFormat::Excel,
                    fields: vec!["title".into(), "status".into()],
                    include_metadata: true,
                }),
            )
            .expect("valid export");
        assert_eq!(
            ok.export_spec().map(|spec| spec.format),
            Some(ExportFormat::Excel)
        );
    }
}
