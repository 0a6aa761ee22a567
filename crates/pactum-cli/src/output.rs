//! Output renderers for command results.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::anyhow;
use pactum_bulk_core::{BulkOperationResult, JobState, OutcomeNotice};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// What a bulk or job command settled on.
#[derive(Debug, Serialize)]
pub(crate) struct OutcomeReport<'a> {
    pub(crate) notice: OutcomeNotice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) job_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<&'a BulkOperationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) delivery: Option<DeliveryReport>,
}

/// Where an export ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum DeliveryReport {
    Download {
        url: String,
        filename: String,
    },
    Saved {
        path: String,
        content_type: &'static str,
        bytes: usize,
    },
}

impl DeliveryReport {
    pub(crate) fn saved(path: &Path, content_type: &'static str, bytes: usize) -> Self {
        Self::Saved {
            path: path.display().to_string(),
            content_type,
            bytes,
        }
    }
}

/// Single status answer for a job.
#[derive(Debug, Serialize)]
pub(crate) struct JobStatusView<'a> {
    pub(crate) job_id: &'a str,
    pub(crate) state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<&'a BulkOperationResult>,
}

pub(crate) fn render_outcome(report: &OutcomeReport<'_>, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Table => {
            let mut text = String::new();
            let _ = writeln!(text, "{}", report.notice.message);
            for item in &report.notice.items {
                let _ = writeln!(text, "  - {item}");
            }
            if let Some(job_id) = report.job_id {
                let _ = writeln!(text, "job: {job_id}");
            }
            if let Some(result) = report.result {
                write_result(&mut text, result);
            }
            match &report.delivery {
                Some(DeliveryReport::Download { url, filename }) => {
                    let _ = writeln!(text, "download: {url}");
                    let _ = writeln!(text, "filename: {filename}");
                }
                Some(DeliveryReport::Saved {
                    path,
                    content_type,
                    bytes,
                }) => {
                    let _ = writeln!(text, "saved: {path} ({bytes} bytes, {content_type})");
                }
                None => {}
            }
            Ok(text.trim_end().to_string())
        }
    }
}

pub(crate) fn render_job_status(view: &JobStatusView<'_>, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(view),
        OutputFormat::Table => {
            let mut text = String::new();
            let _ = writeln!(text, "job: {}", view.job_id);
            let _ = writeln!(text, "state: {}", view.state.as_str());
            if let Some(error) = view.error {
                let _ = writeln!(text, "reason: {error}");
            }
            if let Some(result) = view.result {
                let _ = writeln!(text, "{}", result.summary());
                write_result(&mut text, result);
            }
            Ok(text.trim_end().to_string())
        }
    }
}

fn write_result(text: &mut String, result: &BulkOperationResult) {
    let _ = writeln!(
        text,
        "status: {} ({} ms)",
        result.status.as_str(),
        result.processing_time_ms
    );
    if !result.updated_ids.is_empty() {
        let _ = writeln!(text, "applied: {}", result.updated_ids.join(", "));
    }
    for warning in &result.warnings {
        let _ = writeln!(text, "warning: {warning}");
    }
    if let Some(export) = &result.export {
        let _ = writeln!(
            text,
            "export: {} ({}, {} records)",
            export.export_id,
            export.format.wire_name(),
            export.total_records
        );
    }
}

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}
