//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pactum_bulk_core::{ExportFormat, OperationType};
use serde_json::Value;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliError, CliResult, parse_url};
use crate::commands::bulk::{handle_bulk_delete, handle_bulk_export, handle_bulk_update};
use crate::commands::job::{handle_job_status, handle_job_wait};

/// Parses CLI arguments, executes the requested command, and reports errors
/// on stderr. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4();

    let ctx = match AppContext::from_cli(&cli) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };
    ctx.cancel_on_interrupt();

    let span = tracing::info_span!("pactum.cli", command = command_name, %trace_id);
    let result = dispatch(cli.command, &ctx).instrument(span).await;
    ctx.log_metrics();

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Bulk(bulk) => match bulk {
            BulkCommand::Update(args) => handle_bulk_update(ctx, args).await,
            BulkCommand::Delete(args) => handle_bulk_delete(ctx, &args).await,
            BulkCommand::Export(args) => handle_bulk_export(ctx, args).await,
        },
        Command::Job(job) => match job {
            JobCommand::Status(args) => handle_job_status(ctx, &args).await,
            JobCommand::Wait(args) => handle_job_wait(ctx, &args).await,
        },
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Bulk(BulkCommand::Update(_)) => "bulk_update",
        Command::Bulk(BulkCommand::Delete(_)) => "bulk_delete",
        Command::Bulk(BulkCommand::Export(_)) => "bulk_export",
        Command::Job(JobCommand::Status(_)) => "job_status",
        Command::Job(JobCommand::Wait(_)) => "job_wait",
    }
}

#[derive(Parser)]
#[command(name = "pactum", about = "Bulk contract operations against a Pactum server")]
pub(crate) struct Cli {
    /// JSON settings document.
    #[arg(long, global = true, env = "PACTUM_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, global = true, env = "PACTUM_API_URL", value_parser = parse_url)]
    pub(crate) api_url: Option<Url>,
    #[arg(long, global = true, env = "PACTUM_API_KEY", hide_env_values = true)]
    pub(crate) api_key: Option<String>,
    /// Resource segment of the bulk endpoints.
    #[arg(long, global = true, env = "PACTUM_RESOURCE")]
    pub(crate) resource: Option<String>,
    #[arg(long, global = true, env = "PACTUM_REQUEST_TIMEOUT_MS")]
    pub(crate) timeout_ms: Option<u64>,
    /// Longest wait for an asynchronous job.
    #[arg(long, global = true, env = "PACTUM_POLL_MAX_WAIT_MS")]
    pub(crate) max_wait_ms: Option<u64>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Apply an operation to many contracts at once.
    #[command(subcommand)]
    Bulk(BulkCommand),
    /// Inspect or wait for an asynchronous job.
    #[command(subcommand)]
    Job(JobCommand),
}

#[derive(Subcommand)]
pub(crate) enum BulkCommand {
    /// Set fields on every selected contract.
    Update(BulkUpdateArgs),
    /// Delete every selected contract.
    Delete(BulkDeleteArgs),
    /// Export every selected contract.
    Export(BulkExportArgs),
}

#[derive(Subcommand)]
pub(crate) enum JobCommand {
    /// Query a job once.
    Status(JobArgs),
    /// Poll a job until it settles or the wait budget runs out.
    Wait(JobArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct TargetArgs {
    /// Contract identifiers, comma separated or repeated.
    #[arg(long = "id", value_delimiter = ',')]
    pub(crate) ids: Vec<String>,
    /// File with one contract identifier per line.
    #[arg(long)]
    pub(crate) ids_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct BulkUpdateArgs {
    #[command(flatten)]
    pub(crate) targets: TargetArgs,
    /// Field assignment as `field=value`; JSON values are accepted.
    #[arg(long = "set", required = true, value_parser = parse_assignment)]
    pub(crate) set: Vec<(String, Value)>,
}

#[derive(Args, Debug)]
pub(crate) struct BulkDeleteArgs {
    #[command(flatten)]
    pub(crate) targets: TargetArgs,
    /// Confirm the deletion.
    #[arg(long)]
    pub(crate) yes: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BulkExportArgs {
    #[command(flatten)]
    pub(crate) targets: TargetArgs,
    #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
    pub(crate) format: FormatArg,
    /// Fields to export, comma separated or repeated.
    #[arg(long = "field", value_delimiter = ',', required = true)]
    pub(crate) fields: Vec<String>,
    #[arg(long)]
    pub(crate) include_metadata: bool,
    /// Where to write an artifact built from inline data.
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct JobArgs {
    /// Job identifier from the 202 response.
    pub(crate) job_id: String,
    #[arg(long, value_enum)]
    pub(crate) operation: OperationArg,
    /// Requested format, for export jobs.
    #[arg(long, value_enum)]
    pub(crate) format: Option<FormatArg>,
    /// Column order for inline export records; defaults to the record keys.
    #[arg(long = "field", value_delimiter = ',')]
    pub(crate) fields: Vec<String>,
    /// Poll location when it differs from `/bulk/status/<job_id>`.
    #[arg(long)]
    pub(crate) poll_url: Option<String>,
    /// Number of targets submitted with the job.
    #[arg(long, default_value_t = 0)]
    pub(crate) total: u32,
    /// Where to write an artifact built from inline data.
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum FormatArg {
    Csv,
    Excel,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => Self::Csv,
            FormatArg::Excel => Self::Excel,
            FormatArg::Json => Self::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OperationArg {
    Update,
    Delete,
    Export,
}

impl From<OperationArg> for OperationType {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Update => Self::Update,
            OperationArg::Delete => Self::Delete,
            OperationArg::Export => Self::Export,
        }
    }
}

/// Parse `field=value`, reading the value as JSON when it parses and as a
/// plain string otherwise.
pub(crate) fn parse_assignment(input: &str) -> Result<(String, Value), String> {
    let (field, raw) = input
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{input}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{input}'"));
    }
    let value =
        serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((field.to_string(), value))
}

impl TargetArgs {
    /// Identifiers from `--id` followed by those in `--ids-file`, in order.
    pub(crate) fn collect(&self) -> CliResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if let Some(path) = &self.ids_file {
            let contents = std::fs::read_to_string(path).map_err(|err| {
                CliError::validation(format!(
                    "failed to read ids file '{}': {err}",
                    path.display()
                ))
            })?;
            ids.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }
        if ids.is_empty() {
            return Err(CliError::validation(
                "no contracts selected (pass --id or --ids-file)",
            ));
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn assignments_accept_json_and_plain_strings() {
        assert_eq!(
            parse_assignment("status=ACTIVE").expect("plain string"),
            ("status".to_string(), json!("ACTIVE"))
        );
        assert_eq!(
            parse_assignment("value=1250.5").expect("number"),
            ("value".to_string(), json!(1250.5))
        );
        assert_eq!(
            parse_assignment("tags=[\"renewal\"]").expect("array"),
            ("tags".to_string(), json!(["renewal"]))
        );
        assert!(parse_assignment("=ACTIVE").is_err());
        assert!(parse_assignment("status").is_err());
    }

    #[test]
    fn bulk_update_parses_repeated_and_delimited_ids() {
        let cli = Cli::try_parse_from([
            "pactum",
            "--output",
            "json",
            "bulk",
            "update",
            "--id",
            "c1,c2",
            "--id",
            "c3",
            "--set",
            "status=ACTIVE",
        ])
        .expect("arguments parse");
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Command::Bulk(BulkCommand::Update(args)) => {
                assert_eq!(args.targets.collect().expect("ids"), ["c1", "c2", "c3"]);
                assert_eq!(args.set.len(), 1);
            }
            _ => panic!("expected bulk update"),
        }
    }

    #[test]
    fn empty_targets_are_a_validation_error() {
        let err = TargetArgs::default().collect().expect_err("nothing selected");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn ids_files_skip_blank_lines_and_comments() {
        let path = std::env::temp_dir().join(format!("pactum-ids-{}.txt", std::process::id()));
        std::fs::write(&path, "# selected\nc7\n\n  c8  \n").expect("write ids");
        let targets = TargetArgs {
            ids: vec!["c6".into()],
            ids_file: Some(path.clone()),
        };
        let ids = targets.collect();
        let _ = std::fs::remove_file(&path);
        assert_eq!(ids.expect("ids"), ["c6", "c7", "c8"]);
    }
}
