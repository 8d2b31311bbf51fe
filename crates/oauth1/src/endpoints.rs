//! Twitter base URLs and OAuth endpoint paths
//!
//! The OAuth handshake only talks to `TwitterUrl::Oauth`; the remaining
//! variants identify the REST, upload and streaming hosts a signed client can
//! be pointed at once authorized.

use url::Url;

use crate::error::{Error, Result};

/// Step 1: obtain a request token (relative to `TwitterUrl::Oauth`)
pub const REQUEST_TOKEN_PATH: &str = "oauth/request_token";

/// Step 2: user approval page opened in the browser session
pub const AUTHORIZE_PATH: &str = "oauth/authorize";

/// Step 3: redeem the verified request token for an access token
pub const ACCESS_TOKEN_PATH: &str = "oauth/access_token";

/// Logical Twitter host a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TwitterUrl {
    Api,
    Upload,
    Stream,
    UserStream,
    SiteStream,
    Oauth,
    Publish,
}

impl TwitterUrl {
    /// Every variant, for exhaustive checks.
    pub const ALL: [TwitterUrl; 7] = [
        TwitterUrl::Api,
        TwitterUrl::Upload,
        TwitterUrl::Stream,
        TwitterUrl::UserStream,
        TwitterUrl::SiteStream,
        TwitterUrl::Oauth,
        TwitterUrl::Publish,
    ];

    /// Absolute base URL, always ending in `/` so relative paths append.
    pub fn as_str(self) -> &'static str {
        match self {
            TwitterUrl::Api => "https://api.twitter.com/1.1/",
            TwitterUrl::Upload => "https://upload.twitter.com/1.1/",
            TwitterUrl::Stream => "https://stream.twitter.com/1.1/",
            TwitterUrl::UserStream => "https://userstream.twitter.com/1.1/",
            TwitterUrl::SiteStream => "https://sitestream.twitter.com/1.1/",
            TwitterUrl::Oauth => "https://api.twitter.com/",
            TwitterUrl::Publish => "https://publish.twitter.com/",
        }
    }

    /// Parsed base URL.
    pub fn url(self) -> Url {
        Url::parse(self.as_str()).expect("static Twitter base URL must parse")
    }

    /// Resolve `path` (e.g. `oauth/request_token`) against this base.
    pub fn join(self, path: &str) -> Result<Url> {
        self.url()
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path} against {}: {e}", self.as_str())))
    }
}
