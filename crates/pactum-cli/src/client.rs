//! Error classes, settings resolution, and the context shared by handlers.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use anyhow::anyhow;
use pactum_bulk_core::{
    BatchRequestBuilder, BulkError, BulkOrchestrator, ExportDeliveryHandler, JobPoller,
    OutcomeNotice,
};
use pactum_client::{ClientSettings, HttpBulkBackend};
use pactum_config::{BulkSettings, ConfigError};
use pactum_telemetry::{BulkMetrics, LoggingConfig, init_logging};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cli::{Cli, OutputFormat};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<BulkError> for CliError {
    fn from(err: BulkError) -> Self {
        let message = OutcomeNotice::for_error(&err).message;
        if err.is_preflight() || matches!(err, BulkError::ValidationFailure { .. }) {
            Self::Validation(message)
        } else {
            Self::Failure(anyhow!(message))
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Validation(format!("{:#}", anyhow::Error::new(err)))
    }
}

/// Everything a handler needs to run one command.
pub(crate) struct AppContext {
    pub(crate) settings: BulkSettings,
    pub(crate) orchestrator: BulkOrchestrator<HttpBulkBackend>,
    pub(crate) builder: BatchRequestBuilder,
    pub(crate) delivery: ExportDeliveryHandler,
    pub(crate) metrics: BulkMetrics,
    pub(crate) cancel: CancellationToken,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Resolve settings from file, environment, and flags, then install logging.
    pub(crate) fn from_cli(cli: &Cli) -> CliResult<Self> {
        let settings = resolve_settings(cli)?;
        if let Err(err) = init_logging(&LoggingConfig::from_settings(&settings.telemetry)) {
            eprintln!("warning: {err}");
        }
        Self::new(settings, cli.output)
    }

    /// Wire the HTTP backend, policies, and metrics for `settings`.
    pub(crate) fn new(settings: BulkSettings, output: OutputFormat) -> CliResult<Self> {
        let base_url = pactum_config::parse_base_url(&settings.api.base_url)?;
        let mut client_settings = ClientSettings::new(base_url, settings.api.resource.clone());
        client_settings.api_key.clone_from(&settings.api.api_key);
        client_settings.request_timeout = settings.api.request_timeout();
        let backend = HttpBulkBackend::new(client_settings)
            .map_err(|err| CliError::validation(err.to_string()))?;

        let metrics = BulkMetrics::new().map_err(CliError::failure)?;
        let delivery = ExportDeliveryHandler::new(settings.api.resource.clone());
        let orchestrator = BulkOrchestrator::new(backend)
            .with_retry_policy(settings.retry.policy())
            .with_poller(JobPoller::new(settings.poll.settings()))
            .with_delivery(delivery.clone())
            .with_observer(Arc::new(metrics.clone()));

        Ok(Self {
            builder: settings.batch.builder(),
            settings,
            orchestrator,
            delivery,
            metrics,
            cancel: CancellationToken::new(),
            output,
        })
    }

    /// Cancel in-flight work on Ctrl-C.
    pub(crate) fn cancel_on_interrupt(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; cancelling");
                cancel.cancel();
            }
        });
    }

    pub(crate) fn log_metrics(&self) {
        tracing::debug!(metrics = ?self.metrics.snapshot(), "bulk metrics");
    }
}

/// Merge defaults, the settings file, `PACTUM_*` variables, and flags.
pub(crate) fn resolve_settings(cli: &Cli) -> CliResult<BulkSettings> {
    let mut settings = pactum_config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        settings.api.base_url = url.to_string();
    }
    if let Some(key) = &cli.api_key {
        settings.api.api_key = Some(key.clone());
    }
    if let Some(resource) = &cli.resource {
        settings.api.resource.clone_from(resource);
    }
    if let Some(timeout) = cli.timeout_ms {
        settings.api.request_timeout_ms = timeout;
    }
    if let Some(max_wait) = cli.max_wait_ms {
        settings.poll.max_wait_ms = max_wait;
    }
    pactum_config::validate(&settings)?;
    Ok(settings)
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_errors_map_onto_exit_classes() {
        let validation = CliError::from(BulkError::ValidationFailure {
            status: 422,
            message: "bad status".into(),
        });
        assert_eq!(validation.exit_code(), 2);

        let preflight = CliError::from(BulkError::EmptySelection);
        assert_eq!(preflight.exit_code(), 2);

        let timeout = CliError::from(BulkError::JobTimeout {
            job_id: "j1".into(),
            waited_ms: 30_000,
            polls: 15,
        });
        assert_eq!(timeout.exit_code(), 3);
        assert!(timeout.display_message().contains("may still be processing"));
    }

    #[test]
    fn config_errors_are_validation_failures() {
        let err = CliError::from(ConfigError::InvalidField {
            section: "api",
            field: "base_url",
            message: "unsupported scheme 'ftp'".into(),
        });
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("base_url"));
    }

    #[test]
    fn parse_url_reports_the_input() {
        let err = parse_url("not a url").expect_err("invalid URL");
        assert!(err.contains("not a url"));
    }
}
