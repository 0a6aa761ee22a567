//! Typed settings and their conversions into core policies.

use std::time::Duration;

use pactum_bulk_core::{BatchRequestBuilder, BulkError, PollSettings, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::defaults;

/// Complete settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct BulkSettings {
    /// Where bulk requests are sent.
    pub api: ApiSettings,
    /// Client-side batch limits.
    pub batch: BatchSettings,
    /// Dispatch retry behaviour.
    pub retry: RetryConfig,
    /// Asynchronous job polling.
    pub poll: PollConfig,
    /// Log output.
    pub telemetry: TelemetrySettings,
}

/// Connection settings for the bulk API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    /// API root.
    pub base_url: String,
    /// Resource segment of the bulk paths.
    pub resource: String,
    /// Optional API key; redacted from debug output.
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: defaults::API_URL.to_string(),
            resource: defaults::RESOURCE.to_string(),
            api_key: None,
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
        }
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("resource", &self.resource)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl ApiSettings {
    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Client-side batch limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchSettings {
    /// Largest selection submitted in one request.
    pub max_batch_size: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_batch_size: defaults::MAX_BATCH_SIZE,
        }
    }
}

impl BatchSettings {
    /// Request builder enforcing this limit.
    #[must_use]
    pub fn builder(&self) -> BatchRequestBuilder {
        BatchRequestBuilder::new(self.max_batch_size)
    }
}

/// Dispatch retry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor applied per retry.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            backoff_factor: defaults::RETRY_BACKOFF_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Retry policy retrying transient failures only.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy<BulkError> {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            ..RetryPolicy::default()
        }
    }
}

/// Asynchronous job polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Longest total wait, in milliseconds.
    pub max_wait_ms: u64,
    /// Cadence used when the server gives no hint, in milliseconds.
    pub base_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: defaults::POLL_MAX_WAIT_MS,
            base_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl PollConfig {
    /// Poller settings.
    #[must_use]
    pub const fn settings(&self) -> PollSettings {
        PollSettings {
            max_wait: Duration::from_millis(self.max_wait_ms),
            base_interval: Duration::from_millis(self.base_interval_ms),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

impl LogFormat {
    /// Parse a format name, ignoring case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    /// `EnvFilter` directive, for example `info` or `pactum_bulk_core=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_core_policies() {
        let settings = BulkSettings::default();
        let policy = settings.retry.policy();
        let core = RetryPolicy::<BulkError>::default();
        assert_eq!(policy.max_attempts, core.max_attempts);
        assert_eq!(policy.base_delay, core.base_delay);
        assert!((policy.backoff_factor - core.backoff_factor).abs() < f64::EPSILON);
        assert_eq!(settings.poll.settings(), PollSettings::default());
        assert_eq!(settings.batch.builder().max_batch_size(), pactum_bulk_core::MAX_BATCH_SIZE);
    }

    #[test]
    fn api_key_is_redacted_in_debug_output() {
        let api = ApiSettings {
            api_key: Some("pk_live_secret".into()),
            ..ApiSettings::default()
        };
        let rendered = format!("{api:?}");
        assert!(!rendered.contains("pk_live_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn log_format_parsing_ignores_case() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
