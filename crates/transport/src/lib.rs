//! HTTP transport abstraction for OAuth requests
//!
//! Defines the `Transport` trait that decouples request signing from the
//! network. `ReqwestTransport` sends over a shared reqwest client; tests
//! substitute a scripted transport that records what would have been sent.

pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use reqwest::header::{self, HeaderMap};
pub use reqwest::{Method, StatusCode, Url};

/// Fully prepared request: already signed, body already encoded.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Response metadata and raw body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Classified transport failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// DNS, TLS, connection or protocol failure
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Server answered with a non-2xx status
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Sends bytes, returns bytes.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + '_>>;
}
