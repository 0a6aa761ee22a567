//! Field validation for [`BulkSettings`].

use url::Url;

use crate::defaults::{MAX_ATTEMPTS_LIMIT, MAX_DURATION_MS};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ApiSettings, BulkSettings, PollConfig, RetryConfig};

/// Validate every section, returning the first offending field.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming the section and field.
pub fn validate(settings: &BulkSettings) -> ConfigResult<()> {
    validate_api(&settings.api)?;
    let max = settings.batch.max_batch_size;
    if max == 0 || max > pactum_bulk_core::MAX_BATCH_SIZE {
        return Err(invalid(
            "batch",
            "max_batch_size",
            format!(
                "must be between 1 and {}",
                pactum_bulk_core::MAX_BATCH_SIZE
            ),
        ));
    }
    validate_retry(&settings.retry)?;
    validate_poll(&settings.poll)?;
    if settings.telemetry.level.trim().is_empty() {
        return Err(invalid("telemetry", "level", "must not be empty"));
    }
    Ok(())
}

/// Parse and check an API root.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] unless `value` is an `http` or
/// `https` URL that can carry a path.
pub fn parse_base_url(value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value.trim())
        .map_err(|err| invalid("api", "base_url", format!("'{value}': {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            "api",
            "base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("api", "base_url", "URL cannot carry a path"));
    }
    Ok(url)
}

fn validate_api(api: &ApiSettings) -> ConfigResult<()> {
    parse_base_url(&api.base_url)?;
    let resource = api.resource.trim();
    if resource.is_empty() || resource.contains('/') {
        return Err(invalid(
            "api",
            "resource",
            "must be a single non-empty path segment",
        ));
    }
    if api.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
        return Err(invalid("api", "api_key", "must not be blank when set"));
    }
    ensure_duration("api", "request_timeout_ms", api.request_timeout_ms)
}

fn validate_retry(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.max_attempts == 0 || retry.max_attempts > MAX_ATTEMPTS_LIMIT {
        return Err(invalid(
            "retry",
            "max_attempts",
            format!("must be between 1 and {MAX_ATTEMPTS_LIMIT}"),
        ));
    }
    ensure_duration("retry", "base_delay_ms", retry.base_delay_ms)?;
    if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
        return Err(invalid(
            "retry",
            "backoff_factor",
            "must be a finite number of at least 1.0",
        ));
    }
    Ok(())
}

fn validate_poll(poll: &PollConfig) -> ConfigResult<()> {
    ensure_duration("poll", "max_wait_ms", poll.max_wait_ms)?;
    ensure_duration("poll", "base_interval_ms", poll.base_interval_ms)?;
    if poll.base_interval_ms > poll.max_wait_ms {
        return Err(invalid(
            "poll",
            "base_interval_ms",
            "must not exceed max_wait_ms",
        ));
    }
    Ok(())
}

fn ensure_duration(section: &'static str, field: &'static str, value: u64) -> ConfigResult<()> {
    if value == 0 || value > MAX_DURATION_MS {
        return Err(invalid(
            section,
            field,
            format!("must be between 1 and {MAX_DURATION_MS} milliseconds"),
        ));
    }
    Ok(())
}

fn invalid(section: &'static str, field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field,
        message: message.into(),
    }
}
