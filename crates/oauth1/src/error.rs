//! Error types for OAuth 1.0a primitives

/// Errors from token parsing and request signing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed token response: {0}")]
    Parse(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result alias for OAuth 1.0a operations.
pub type Result<T> = std::result::Result<T, Error>;
