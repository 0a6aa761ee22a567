#![forbid(unsafe_code)]
#![deny(
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery)]

//! Configuration for Pactum bulk operations.
//!
//! Layout: `model.rs` (typed settings and conversions into core policies),
//! `defaults.rs` (default values), `validate.rs` (field validation),
//! `loader.rs` (JSON documents and `PACTUM_*` environment overrides).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_PREFIX, apply_env, load, load_from_path, load_from_str};
pub use model::{
    ApiSettings, BatchSettings, BulkSettings, LogFormat, PollConfig, RetryConfig,
    TelemetrySettings,
};
pub use validate::{parse_base_url, validate};
