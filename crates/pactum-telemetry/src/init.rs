//! Subscriber installation and logging configuration.
//!
//! # Design
//! - One entry point installs either JSON or human-readable output.
//! - Logs go to stderr so command output on stdout stays machine-readable.
//! - `RUST_LOG` wins over the configured level when present.
//! - The build SHA is recorded once and reused by every caller.

use once_cell::sync::OnceCell;
use pactum_config::{LogFormat, TelemetrySettings};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Default logging target when neither `RUST_LOG` nor a level is provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// `EnvFilter` directive (for example `info` or `pactum_client=debug`).
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier recorded in structured logs.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::default(),
            build_sha: build_sha(),
        }
    }
}

impl<'a> LoggingConfig<'a> {
    /// Logging configuration taken from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &'a TelemetrySettings) -> Self {
        Self {
            level: &settings.level,
            format: settings.format,
            build_sha: build_sha(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggingInstall`] if a global subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(build_env_filter(config.level))
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(build_env_filter(config.level))
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::LoggingInstall {
        format: config.format,
        source,
    })?;

    tracing::debug!(build_sha = build_sha(), "logging initialised");
    Ok(())
}

/// Build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_map_onto_logging_config() {
        let settings = TelemetrySettings {
            level: "pactum_client=debug".into(),
            format: LogFormat::Json,
        };
        let config = LoggingConfig::from_settings(&settings);
        assert_eq!(config.level, "pactum_client=debug");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn second_installation_is_reported() {
        let config = LoggingConfig {
            level: "warn",
            format: LogFormat::Pretty,
            build_sha: "abc123",
        };
        let _ = init_logging(&config);
        let err = init_logging(&config).expect_err("subscriber already installed");
        assert!(matches!(
            err,
            TelemetryError::LoggingInstall {
                format: LogFormat::Pretty,
                ..
            }
        ));
        assert_eq!(build_sha(), "abc123");
    }
}
