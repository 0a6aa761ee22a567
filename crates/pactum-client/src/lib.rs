#![forbid(unsafe_code)]
#![deny(
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::pedantic, clippy::nursery)]

//! HTTP transport for Pactum bulk operations.
//!
//! Layout: `backend.rs` (the reqwest-backed [`HttpBulkBackend`]), `classify.rs`
//! (status and transport error classification), `error.rs` (construction errors).

pub mod backend;
pub mod classify;
pub mod error;

pub use backend::{
    ClientSettings, HEADER_API_KEY, HEADER_IDEMPOTENCY_KEY, HEADER_REQUEST_ID, HttpBulkBackend,
};
pub use error::{ClientError, ClientResult};
