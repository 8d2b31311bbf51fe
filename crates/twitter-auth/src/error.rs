//! Error taxonomy for the authorization handshake

use transport::TransportError;

/// Why an authorization attempt ended without a token.
///
/// Every variant is terminal for the attempt; nothing here is retried
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// User declined or dismissed the session, or the callback had no verifier
    #[error("authorization cancelled: {0}")]
    Cancelled(String),

    /// Server broke the OAuth contract, or an exchange was attempted without a verifier
    #[error("bad OAuth response: {0}")]
    BadOAuthResponse(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Token response body was not a usable form-encoded token
    #[error("unparseable token response: {0}")]
    ParseFailure(oauth1::Error),

    /// Another attempt holds the credential store
    #[error("another authorization is already in progress")]
    Busy,

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<oauth1::Error> for Error {
    fn from(err: oauth1::Error) -> Self {
        match err {
            err @ oauth1::Error::Parse(_) => Error::ParseFailure(err),
            oauth1::Error::Signing(msg) | oauth1::Error::InvalidUrl(msg) => Error::Signing(msg),
        }
    }
}

/// Copyable classification of an `Error`, kept in the `Failed` state and
/// used as the metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Cancelled,
    BadOAuthResponse,
    Transport,
    ParseFailure,
    Busy,
    Signing,
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Cancelled => "cancelled",
            FailureKind::BadOAuthResponse => "bad_oauth_response",
            FailureKind::Transport => "transport",
            FailureKind::ParseFailure => "parse_failure",
            FailureKind::Busy => "busy",
            FailureKind::Signing => "signing",
            FailureKind::Internal => "internal",
        }
    }
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Cancelled(_) => FailureKind::Cancelled,
            Error::BadOAuthResponse(_) => FailureKind::BadOAuthResponse,
            Error::Transport(_) => FailureKind::Transport,
            Error::ParseFailure(_) => FailureKind::ParseFailure,
            Error::Busy => FailureKind::Busy,
            Error::Signing(_) => FailureKind::Signing,
            Error::Internal(_) => FailureKind::Internal,
        }
    }
}

/// Result alias for handshake operations.
pub type Result<T> = std::result::Result<T, Error>;
