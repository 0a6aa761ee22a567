//! Loading settings from JSON documents and the environment.
//!
//! Precedence, lowest first: built-in defaults, the JSON document (when one
//! is given), then `PACTUM_*` environment variables. The merged result is
//! validated before it is returned.

use std::path::Path;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{BulkSettings, LogFormat};
use crate::validate::validate;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "PACTUM_";

/// Load settings from an optional file plus the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, an
/// override is malformed, or the merged settings are invalid.
pub fn load(path: Option<&Path>) -> ConfigResult<BulkSettings> {
    let settings = match path {
        Some(path) => read_document(path)?,
        None => BulkSettings::default(),
    };
    let settings = apply_env(settings, |name| std::env::var(name).ok())?;
    validate(&settings)?;
    tracing::debug!(
        base_url = %settings.api.base_url,
        resource = %settings.api.resource,
        max_batch_size = settings.batch.max_batch_size,
        "configuration loaded"
    );
    Ok(settings)
}

/// Load and validate settings from a JSON file, ignoring the environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, parsed, or validated.
pub fn load_from_path(path: &Path) -> ConfigResult<BulkSettings> {
    let settings = read_document(path)?;
    validate(&settings)?;
    Ok(settings)
}

/// Parse and validate a JSON settings document. Missing sections take defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] when the document cannot be parsed or validated.
pub fn load_from_str(document: &str) -> ConfigResult<BulkSettings> {
    let settings = parse_document(document)?;
    validate(&settings)?;
    Ok(settings)
}

/// Apply `PACTUM_*` overrides read through `lookup`.
///
/// Unset or blank variables leave the current value in place.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when a value cannot be parsed.
pub fn apply_env<F>(mut settings: BulkSettings, lookup: F) -> ConfigResult<BulkSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |suffix: &str| {
        let name = format!("{ENV_PREFIX}{suffix}");
        lookup(&name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| (name, value))
    };

    if let Some((_, value)) = read("API_URL") {
        settings.api.base_url = value;
    }
    if let Some((_, value)) = read("RESOURCE") {
        settings.api.resource = value;
    }
    if let Some((_, value)) = read("API_KEY") {
        settings.api.api_key = Some(value);
    }
    if let Some((name, value)) = read("REQUEST_TIMEOUT_MS") {
        settings.api.request_timeout_ms = parse_env(&name, &value)?;
    }
    if let Some((name, value)) = read("MAX_BATCH_SIZE") {
        settings.batch.max_batch_size = parse_env(&name, &value)?;
    }
    if let Some((name, value)) = read("RETRY_MAX_ATTEMPTS") {
        settings.retry.max_attempts = parse_env(&name, &value)?;
    }
    if let Some((name, value)) = read("RETRY_BASE_DELAY_MS") {
        settings.retry.base_delay_ms = parse_env(&name, &value)?;
    }
    if let Some((name, value)) = read("RETRY_BACKOFF_FACTOR") {
        settings.retry.backoff_factor = parse_env(&name, &value)?;
    }
    if let Some((name, value)) = read("POLL_MAX_WAIT_MS") {
        settings.poll.max_wait_ms = parse_env(&name, &value)?;
    }
    if let Some((name, value)) = read("POLL_INTERVAL_MS") {
        settings.poll.base_interval_ms = parse_env(&name, &value)?;
    }
    if let Some((_, value)) = read("LOG_LEVEL") {
        settings.telemetry.level = value;
    }
    if let Some((name, value)) = read("LOG_FORMAT") {
        settings.telemetry.format =
            LogFormat::parse(&value).ok_or_else(|| ConfigError::InvalidEnv {
                name,
                value,
                message: "expected 'json' or 'pretty'".into(),
            })?;
    }
    Ok(settings)
}

fn read_document(path: &Path) -> ConfigResult<BulkSettings> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&raw)
}

fn parse_document(document: &str) -> ConfigResult<BulkSettings> {
    serde_json::from_str(document).map_err(|source| ConfigError::Parse { source })
}

fn parse_env<T>(name: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
        message: err.to_string(),
    })
}
