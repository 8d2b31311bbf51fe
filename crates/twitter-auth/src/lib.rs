//! Twitter OAuth 1.0a three-legged authorization
//!
//! Builds the handshake on top of the `oauth1` primitives and a pluggable
//! `transport::Transport`. The host supplies a `WebAuthSession` that shows
//! the authorization page to the user.
//!
//! Authorization flow:
//! 1. `Authorizer::authorize()` claims the credential store (one attempt at a time)
//! 2. Signed POST to `oauth/request_token` with `oauth_callback` → request token
//! 3. `WebAuthSession::start()` opens `oauth/authorize?oauth_token=...`
//! 4. Callback URL carries `oauth_verifier` (missing → `Error::Cancelled`)
//! 5. Signed POST to `oauth/access_token` with token + verifier → access token
//! 6. Access token written to the credential store and returned

pub mod authorizer;
pub mod client;
pub mod error;
pub mod flow;
pub mod session;

#[cfg(test)]
mod test_support;

pub use authorizer::{Authorization, Authorizer};
pub use client::SignedClient;
pub use error::{Error, FailureKind, Result};
pub use flow::{AuthAction, AuthEvent, AuthState, AuthorizeRequest, authorization_url, handle_event};
pub use session::{SessionOutcome, SessionRequest, WebAuthSession};
