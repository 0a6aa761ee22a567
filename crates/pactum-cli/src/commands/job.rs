use chrono::Utc;
use pactum_api_models::default_status_path;
use pactum_bulk_core::{
    AsyncJobHandle, BulkBackend, BulkOutcome, ExportFormat, ExportSpec, OperationStatus,
    OperationType,
};

use crate::cli::JobArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::bulk::settle;
use crate::output::{JobStatusView, render_job_status};

pub(crate) async fn handle_job_status(ctx: &AppContext, args: &JobArgs) -> CliResult<()> {
    let handle = job_handle(args)?;
    let report = ctx.orchestrator.backend().job_status(&handle).await?;
    let view = JobStatusView {
        job_id: &handle.job_id,
        state: report.state,
        error: report.error.as_deref(),
        result: report.result.as_ref(),
    };
    println!("{}", render_job_status(&view, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_job_wait(ctx: &AppContext, args: &JobArgs) -> CliResult<()> {
    let handle = job_handle(args)?;
    tracing::info!(
        job_id = %handle.job_id,
        max_wait_ms = ctx.settings.poll.max_wait_ms,
        "waiting for job"
    );
    let outcome = ctx.orchestrator.await_job(&handle, &ctx.cancel).await?;

    let outcome = match (outcome, handle.export_format) {
        (
            BulkOutcome::Finished {
                result,
                delivery: None,
            },
            Some(format),
        ) if result.status != OperationStatus::Failed => {
            let spec = ExportSpec {
                format,
                fields: args.fields.clone(),
                include_metadata: false,
            };
            let delivery = ctx.delivery.deliver(&result, &spec, None)?;
            BulkOutcome::Finished {
                result,
                delivery: Some(delivery),
            }
        }
        (outcome, _) => outcome,
    };
    settle(ctx, &outcome, Some(&handle.job_id), args.out.as_deref()).await
}

fn job_handle(args: &JobArgs) -> CliResult<AsyncJobHandle> {
    let job_id = args.job_id.trim();
    if job_id.is_empty() {
        return Err(CliError::validation("job id must not be empty"));
    }
    let operation = OperationType::from(args.operation);
    if (args.format.is_some() || !args.fields.is_empty()) && operation != OperationType::Export {
        return Err(CliError::validation(
            "--format and --field only apply to export jobs",
        ));
    }

    Ok(AsyncJobHandle {
        job_id: job_id.to_string(),
        poll_url_or_key: args
            .poll_url
            .clone()
            .unwrap_or_else(|| default_status_path(job_id)),
        created_at: Utc::now(),
        suggested_poll_interval: None,
        operation_type: operation,
        total_requested: args.total,
        export_format: (operation == OperationType::Export)
            .then(|| args.format.map_or(ExportFormat::Csv, ExportFormat::from)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{FormatArg, OperationArg};
    use crate::commands::bulk::tests::context;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    fn args(job_id: &str, operation: OperationArg, format: Option<FormatArg>) -> JobArgs {
        JobArgs {
            job_id: job_id.into(),
            operation,
            format,
            fields: Vec::new(),
            poll_url: None,
            total: 2,
            out: None,
        }
    }

    #[test]
    fn export_handles_default_to_csv_and_the_standard_path() {
        let handle = job_handle(&args("j1", OperationArg::Export, None)).expect("handle");
        assert_eq!(handle.poll_url_or_key, "/bulk/status/j1");
        assert_eq!(handle.export_format, Some(ExportFormat::Csv));

        let handle = job_handle(&args("j2", OperationArg::Delete, None)).expect("handle");
        assert_eq!(handle.export_format, None);
    }

    #[test]
    fn format_is_rejected_for_non_export_jobs() {
        let err = job_handle(&args("j1", OperationArg::Update, Some(FormatArg::Json)))
            .expect_err("format on update job");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn status_queries_the_job_once() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/bulk/status/j1");
            then.status(200).json_body(json!({"status": "processing"}));
        });

        handle_job_status(&context(&server), &args("j1", OperationArg::Update, None))
            .await
            .expect("status reported");
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn wait_delivers_completed_exports() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/bulk/status/j7");
            then.status(200).json_body(json!({
                "status": "completed",
                "export_id": "e7",
                "download_url": "https://files.pactum.example/e7.xlsx"
            }));
        });

        handle_job_wait(
            &context(&server),
            &args("j7", OperationArg::Export, Some(FormatArg::Excel)),
        )
        .await
        .expect("export delivered");
        mock.assert();
    }

    #[tokio::test]
    async fn wait_renders_inline_export_records() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/bulk/status/j8");
            then.status(200).json_body(json!({
                "status": "completed",
                "result": {
                    "export_id": "e8",
                    "format": "CSV",
                    "total_records": 2,
                    "records": [
                        {"id": "c1", "title": "A, Inc"},
                        {"id": "c2", "title": "B"}
                    ]
                }
            }));
        });

        let out = std::env::temp_dir().join(format!("pactum-job-{}.csv", std::process::id()));
        let mut job = args("j8", OperationArg::Export, None);
        job.out = Some(out.clone());
        let outcome = handle_job_wait(&context(&server), &job).await;
        let written = std::fs::read_to_string(&out);
        let _ = std::fs::remove_file(&out);

        outcome.expect("export delivered");
        assert_eq!(
            written.expect("artifact written"),
            "id,title\r\nc1,\"A, Inc\"\r\nc2,B\r\n"
        );
    }

    #[tokio::test]
    async fn named_fields_order_inline_export_columns() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/bulk/status/j9");
            then.status(200).json_body(json!({
                "status": "completed",
                "result": {
                    "export_id": "e9",
                    "format": "CSV",
                    "total_records": 1,
                    "records": [{"id": "c1", "title": "Lease", "status": "ACTIVE"}]
                }
            }));
        });

        let out = std::env::temp_dir().join(format!("pactum-job-fields-{}.csv", std::process::id()));
        let mut job = args("j9", OperationArg::Export, Some(FormatArg::Csv));
        job.fields = vec!["title".into(), "id".into()];
        job.out = Some(out.clone());
        let outcome = handle_job_wait(&context(&server), &job).await;
        let written = std::fs::read_to_string(&out);
        let _ = std::fs::remove_file(&out);

        outcome.expect("export delivered");
        assert_eq!(written.expect("artifact written"), "title,id\r\nLease,c1\r\n");
    }

    #[test]
    fn fields_are_rejected_for_non_export_jobs() {
        let mut job = args("j1", OperationArg::Delete, None);
        job.fields = vec!["title".into()];
        let err = job_handle(&job).expect_err("fields on delete job");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn failed_jobs_exit_with_failure_class() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/bulk/status/j3");
            then.status(200)
                .json_body(json!({"status": "failed", "error": "worker crashed"}));
        });

        let err = handle_job_wait(&context(&server), &args("j3", OperationArg::Update, None))
            .await
            .expect_err("job failure surfaces");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("worker crashed"));
    }
}
