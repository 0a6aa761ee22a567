use std::time::Duration;

use httpmock::MockServer;
use httpmock::prelude::*;
use pactum_bulk_core::{
    BulkError, BulkOrchestrator, BulkOutcome, DeliveryOutcome, ErrorCode, ExportFormat,
    OperationIntent, OperationStatus, RetryPolicy,
};
use pactum_client::{
    ClientSettings, HEADER_API_KEY, HEADER_IDEMPOTENCY_KEY, HEADER_REQUEST_ID, HttpBulkBackend,
};
use pactum_test_support::fixtures::{FIXTURE_KEY, activate_intent, export_intent, request};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn orchestrator(server: &MockServer) -> BulkOrchestrator<HttpBulkBackend> {
    let mut settings = ClientSettings::new(
        server.base_url().parse().expect("valid URL"),
        "contracts",
    );
    settings.api_key = Some("pk_test".into());
    let backend = HttpBulkBackend::new(settings).expect("backend builds");
    BulkOrchestrator::new(backend).with_retry_policy(RetryPolicy {
        base_delay: Duration::from_millis(1),
        ..RetryPolicy::default()
    })
}

#[tokio::test]
async fn immediate_update_results_are_parsed_and_aggregated() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/bulk/contracts/update")
            .header(HEADER_IDEMPOTENCY_KEY, FIXTURE_KEY)
            .header(HEADER_API_KEY, "pk_test")
            .header_exists(HEADER_REQUEST_ID)
            .json_body(json!({
                "contract_ids": ["c1", "c2", "c3"],
                "updates": {"status": "ACTIVE"}
            }));
        then.status(200).json_body(json!({
            "total_requested": 3,
            "success_count": 2,
            "failed_count": 1,
            "updated_ids": ["c1", "c2"],
            "errors": [{
                "resource_id": "c3",
                "error_code": "VALIDATION_ERROR",
                "error_message": "Cannot update contract in current status"
            }],
            "processing_time_ms": 42
        }));
    });

    let outcome = orchestrator(&server)
        .execute(
            &request(&["c1", "c2", "c3"], activate_intent()),
            &CancellationToken::new(),
        )
        .await?;

    mock.assert();
    let result = outcome.result().expect("finished");
    assert_eq!(result.status, OperationStatus::Partial);
    assert_eq!(result.errors[0].error_code, ErrorCode::ValidationError);
    assert_eq!(result.processing_time_ms, 42);
    Ok(())
}

#[tokio::test]
async fn accepted_export_is_polled_until_a_download_is_ready() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    let dispatch = server.mock(|when, then| {
        when.method(POST)
            .path("/bulk/contracts/export")
            .json_body(json!({
                "contract_ids": ["c1", "c2"],
                "format": "EXCEL",
                "fields": ["title", "status"],
                "include_metadata": false
            }));
        then.status(202).json_body(json!({
            "job_id": "j1",
            "poll_url": "/bulk/status/j1",
            "poll_interval_ms": 10
        }));
    });
    let status = server.mock(|when, then| {
        when.method(GET).path("/bulk/status/j1");
        then.status(200).json_body(json!({
            "status": "completed",
            "export_id": "e1",
            "download_url": "https://files.pactum.example/e1.xlsx?sig=abc"
        }));
    });

    let outcome = orchestrator(&server)
        .execute(
            &request(&["c1", "c2"], export_intent(ExportFormat::Excel)),
            &CancellationToken::new(),
        )
        .await?;

    dispatch.assert();
    status.assert();
    let BulkOutcome::Finished { result, delivery } = outcome else {
        panic!("expected a finished export");
    };
    assert_eq!(result.status, OperationStatus::Completed);
    match delivery {
        Some(DeliveryOutcome::Download {
            url,
            suggested_filename,
        }) => {
            assert_eq!(url, "https://files.pactum.example/e1.xlsx?sig=abc");
            assert!(suggested_filename.ends_with(".xlsx"));
        }
        other => panic!("expected a download, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn server_errors_are_retried_with_the_same_key() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/bulk/contracts/delete")
            .header(HEADER_IDEMPOTENCY_KEY, FIXTURE_KEY);
        then.status(503).body("upstream unavailable");
    });

    let err = orchestrator(&server)
        .execute(
            &request(&["c1"], OperationIntent::Delete),
            &CancellationToken::new(),
        )
        .await
        .expect_err("persistent outage surfaces");

    mock.assert_calls(3);
    assert_eq!(
        err,
        BulkError::TransientFailure {
            status: Some(503),
            message: "upstream unavailable".into(),
            attempts: 3,
        }
    );
}

#[tokio::test]
async fn validation_problems_fail_without_retry() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/bulk/contracts/update");
        then.status(422).json_body(json!({
            "type": "https://pactum.example/problems/validation",
            "title": "Unprocessable Entity",
            "status": 422,
            "detail": "status ARCHIVED cannot be set in bulk"
        }));
    });

    let err = orchestrator(&server)
        .execute(
            &request(&["c1", "c2"], activate_intent()),
            &CancellationToken::new(),
        )
        .await
        .expect_err("validation failure surfaces");

    mock.assert_calls(1);
    assert_eq!(
        err,
        BulkError::ValidationFailure {
            status: 422,
            message: "status ARCHIVED cannot be set in bulk".into(),
        }
    );
}

#[tokio::test]
async fn permission_failures_are_terminal() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/bulk/contracts/delete");
        then.status(403).json_body(json!({
            "title": "Forbidden",
            "status": 403
        }));
    });

    let err = orchestrator(&server)
        .execute(
            &request(&["c1"], OperationIntent::Delete),
            &CancellationToken::new(),
        )
        .await
        .expect_err("forbidden surfaces");

    mock.assert_calls(1);
    assert!(matches!(err, BulkError::PermissionDenied { status: 403, ref message } if message == "Forbidden"));
}

#[tokio::test]
async fn malformed_bodies_are_rejected_at_the_boundary() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/bulk/contracts/update");
        then.status(200).json_body(json!({"ok": true}));
    });

    let err = orchestrator(&server)
        .execute(
            &request(&["c1"], activate_intent()),
            &CancellationToken::new(),
        )
        .await
        .expect_err("schema breach surfaces");

    assert!(matches!(
        err,
        BulkError::MalformedResponse {
            context: "dispatch",
            ..
        }
    ));
}
