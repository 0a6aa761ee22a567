//! Default values for bulk operation settings.

/// API root used when nothing is configured.
pub const API_URL: &str = "http://127.0.0.1:8080";
/// Resource segment of bulk endpoints.
pub const RESOURCE: &str = "contracts";
/// Per-request timeout.
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Attempts per dispatch, including the first.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry.
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;
/// Backoff growth factor.
pub const RETRY_BACKOFF_FACTOR: f64 = 2.0;
/// Longest wait for an asynchronous job.
pub const POLL_MAX_WAIT_MS: u64 = 30_000;
/// Default cadence between status queries.
pub const POLL_INTERVAL_MS: u64 = 2_000;
/// Default log filter.
pub const LOG_LEVEL: &str = "info";
/// Default batch ceiling; the server rejects anything larger.
pub const MAX_BATCH_SIZE: usize = pactum_bulk_core::MAX_BATCH_SIZE;

/// Upper bound accepted for `retry.max_attempts`.
pub(crate) const MAX_ATTEMPTS_LIMIT: u32 = 10;
/// Upper bound accepted for any single delay or timeout.
pub(crate) const MAX_DURATION_MS: u64 = 600_000;
