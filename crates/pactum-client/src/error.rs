//! Errors raised while constructing the HTTP transport.

use thiserror::Error;

/// Failures that prevent an [`crate::HttpBulkBackend`] from being built.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The base URL cannot carry request paths.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// URL as configured.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The resource segment is empty or contains a path separator.
    #[error("invalid resource name '{0}'")]
    InvalidResource(String),
    /// The API key cannot be sent as a header value.
    #[error("API key contains characters that are not valid in a header")]
    InvalidApiKey,
    /// reqwest refused the client configuration.
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),
}

/// Convenience alias for client construction results.
pub type ClientResult<T> = Result<T, ClientError>;
