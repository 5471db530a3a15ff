//! Error types for rtsub-core.

use thiserror::Error;

/// Endpoint resolution errors. Never retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported URL {url}: {reason}")]
    UnsupportedUrl { url: String, reason: &'static str },
}

/// Credentials capability failures.
///
/// An `AuthError` aborts the handshake or subscribe attempt that needed the
/// material; nothing retries automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Credentials unavailable: {0}")]
    Unavailable(String),

    #[error("Credentials fetch failed: {0}")]
    FetchFailed(String),
}

/// Result type alias for endpoint operations.
pub type Result<T> = std::result::Result<T, EndpointError>;
