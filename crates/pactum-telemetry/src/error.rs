//! Failures while wiring logging or the bulk metrics registry.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use pactum_config::LogFormat;
use prometheus::Error as PrometheusError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step at which a bulk metric collector failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStage {
    /// Constructing the collector (bad name, help, or labels).
    Build,
    /// Adding the collector to the registry (usually a duplicate name).
    Register,
}

impl MetricStage {
    const fn verb(self) -> &'static str {
        match self {
            Self::Build => "built",
            Self::Register => "registered",
        }
    }
}

/// Errors raised while installing logging or exposing bulk metrics.
#[derive(Debug)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    LoggingInstall {
        /// Format that was being installed.
        format: LogFormat,
        /// Underlying subscriber error.
        source: TryInitError,
    },
    /// A bulk metric collector could not be set up.
    Metric {
        /// Collector name, for example `bulk_operations_total`.
        name: &'static str,
        /// Step that failed.
        stage: MetricStage,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The text exposition could not be encoded.
    Exposition {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The encoded exposition was not UTF-8.
    ExpositionUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) fn building(name: &'static str) -> impl FnOnce(PrometheusError) -> Self {
        move |source| Self::Metric {
            name,
            stage: MetricStage::Build,
            source,
        }
    }

    pub(crate) fn registering(name: &'static str) -> impl FnOnce(PrometheusError) -> Self {
        move |source| Self::Metric {
            name,
            stage: MetricStage::Register,
            source,
        }
    }
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggingInstall { format, .. } => write!(
                formatter,
                "could not install {} logging; a subscriber is already active",
                match format {
                    LogFormat::Json => "json",
                    LogFormat::Pretty => "pretty",
                }
            ),
            Self::Metric { name, stage, .. } => {
                write!(formatter, "bulk metric '{name}' could not be {}", stage.verb())
            }
            Self::Exposition { .. } => formatter.write_str("could not encode bulk metrics"),
            Self::ExpositionUtf8 { .. } => {
                formatter.write_str("encoded bulk metrics were not valid utf-8")
            }
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LoggingInstall { source, .. } => Some(source),
            Self::Metric { source, .. } | Self::Exposition { source } => Some(source),
            Self::ExpositionUtf8 { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_failures_name_the_collector_and_stage() {
        let err = TelemetryError::registering("bulk_operations_total")(PrometheusError::Msg(
            "duplicate".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "bulk metric 'bulk_operations_total' could not be registered"
        );
        assert!(err.source().is_some());

        let err = TelemetryError::building("bulk_job_polls_total")(PrometheusError::Msg(
            "bad label".to_string(),
        ));
        assert!(matches!(
            err,
            TelemetryError::Metric {
                stage: MetricStage::Build,
                ..
            }
        ));
    }

    #[test]
    fn exposition_errors_keep_their_source() {
        let utf8 = String::from_utf8(vec![0, 159]).expect_err("invalid utf-8");
        let err = TelemetryError::ExpositionUtf8 { source: utf8 };
        assert_eq!(err.to_string(), "encoded bulk metrics were not valid utf-8");
        assert!(err.source().is_some());
    }
}
