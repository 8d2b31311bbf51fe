//! Service-specific error types

use thiserror::Error;

/// Host lifecycle errors.
///
/// Handshake failures come back from `twitter_auth::Authorizer` as
/// `twitter_auth::Error`; the variants here cover what the host itself sets up.
#[derive(Error, Debug)]
pub enum Error {
    #[error("callback listener failed: {0}")]
    CallbackListener(String),

    #[error("authorization aborted by signal")]
    Aborted,
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
