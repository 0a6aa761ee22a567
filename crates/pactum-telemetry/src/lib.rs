#![forbid(unsafe_code)]
#![deny(
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery)]

//! Telemetry for bulk operations: subscriber installation and a
//! Prometheus-backed [`pactum_bulk_core::BulkObserver`].

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{MetricStage, Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LoggingConfig, build_sha, init_logging};
pub use metrics::{BulkMetrics, MetricsSnapshot};
