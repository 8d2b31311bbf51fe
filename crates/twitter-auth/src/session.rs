//! Interactive browser session seam
//!
//! The host owns the browser integration: it opens the authorization page,
//! lets the user approve or deny, and reports how the session ended. There
//! is no timeout here; the session may wait indefinitely.

use std::future::Future;
use std::pin::Pin;

use url::Url;

/// What the host is asked to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// `oauth/authorize?oauth_token=...` page
    pub url: Url,
    /// Scheme of the callback URL; navigation to it ends the session
    pub callback_scheme: String,
    /// Prefer a private browsing session with no shared cookies
    pub ephemeral: bool,
}

/// How a browser session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Browser navigated to the callback URL
    Callback(Url),
    /// Session could not complete (presentation failure, host abort, ...)
    Failed(String),
    /// User dismissed the session without an error
    Cancelled,
}

/// Presents the authorization page to the user.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn WebAuthSession>`).
pub trait WebAuthSession: Send + Sync {
    fn start(
        &self,
        request: SessionRequest,
    ) -> Pin<Box<dyn Future<Output = SessionOutcome> + Send + '_>>;
}
