use std::path::{Path, PathBuf};

use anyhow::anyhow;
use pactum_bulk_core::{
    BulkOutcome, DeliveryOutcome, ExportSpec, FieldUpdates, OperationIntent, OperationStatus,
    SelectionController,
};

use crate::cli::{BulkDeleteArgs, BulkExportArgs, BulkUpdateArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{DeliveryReport, OutcomeReport, render_outcome};

pub(crate) async fn handle_bulk_update(ctx: &AppContext, args: BulkUpdateArgs) -> CliResult<()> {
    let ids = args.targets.collect()?;
    let updates: FieldUpdates = args.set.into_iter().collect();
    submit(ctx, ids, OperationIntent::Update(updates), None).await
}

pub(crate) async fn handle_bulk_delete(ctx: &AppContext, args: &BulkDeleteArgs) -> CliResult<()> {
    let ids = args.targets.collect()?;
    if !args.yes {
        return Err(CliError::validation(format!(
            "refusing to delete {} contract(s) without --yes",
            ids.len()
        )));
    }
    submit(ctx, ids, OperationIntent::Delete, None).await
}

pub(crate) async fn handle_bulk_export(ctx: &AppContext, args: BulkExportArgs) -> CliResult<()> {
    let ids = args.targets.collect()?;
    let intent = OperationIntent::Export(ExportSpec {
        format: args.format.into(),
        fields: args.fields,
        include_metadata: args.include_metadata,
    });
    submit(ctx, ids, intent, args.out.as_deref()).await
}

async fn submit(
    ctx: &AppContext,
    ids: Vec<String>,
    intent: OperationIntent,
    out: Option<&Path>,
) -> CliResult<()> {
    let mut controller = SelectionController::new();
    controller.selection_mut().select_all(ids);
    let outcome = ctx
        .orchestrator
        .submit(&mut controller, &ctx.builder, intent, &ctx.cancel)
        .await?;
    settle(ctx, &outcome, None, out).await
}

/// Print the outcome, save any inline artifact, and turn total failure or
/// cancellation into a non-zero exit.
pub(crate) async fn settle(
    ctx: &AppContext,
    outcome: &BulkOutcome,
    job_id: Option<&str>,
    out: Option<&Path>,
) -> CliResult<()> {
    let delivery = match outcome {
        BulkOutcome::Finished {
            delivery: Some(delivery),
            ..
        } => Some(save_delivery(delivery, out).await?),
        _ => None,
    };
    let job_id = match outcome {
        BulkOutcome::Abandoned { job_id: Some(id) } => Some(id.as_str()),
        _ => job_id,
    };
    let report = OutcomeReport {
        notice: outcome.notice(),
        job_id,
        result: outcome.result(),
        delivery,
    };
    println!("{}", render_outcome(&report, ctx.output)?);

    match outcome {
        BulkOutcome::Finished { result, .. } if result.status == OperationStatus::Failed => {
            Err(CliError::failure(anyhow!(
                "{} failed: {}",
                result.operation_type,
                result.summary()
            )))
        }
        BulkOutcome::Abandoned { .. } => Err(CliError::failure(anyhow!(
            "cancelled before the operation settled"
        ))),
        BulkOutcome::Finished { .. } => Ok(()),
    }
}

async fn save_delivery(
    delivery: &DeliveryOutcome,
    out: Option<&Path>,
) -> CliResult<DeliveryReport> {
    match delivery {
        DeliveryOutcome::Download {
            url,
            suggested_filename,
        } => Ok(DeliveryReport::Download {
            url: url.clone(),
            filename: suggested_filename.clone(),
        }),
        DeliveryOutcome::Artifact(artifact) => {
            let path = out.map_or_else(|| PathBuf::from(&artifact.filename), Path::to_path_buf);
            tokio::fs::write(&path, &artifact.bytes)
                .await
                .map_err(|err| {
                    CliError::failure(anyhow!("failed to write '{}': {err}", path.display()))
                })?;
            tracing::info!(
                path = %path.display(),
                bytes = artifact.bytes.len(),
                "export artifact saved"
            );
            Ok(DeliveryReport::saved(
                &path,
                artifact.content_type,
                artifact.bytes.len(),
            ))
        }
    }
}
