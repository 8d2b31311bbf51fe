//! OAuth 1.0a primitives for Twitter
//!
//! Endpoint resolution, key pairs and tokens, the form-encoded token response
//! parser, HMAC-SHA1 request signing, and the in-memory credential holder.
//! Nothing in this crate performs network I/O; the handshake itself lives in
//! `twitter-auth`.
//!
//! Handshake outline:
//! 1. POST `REQUEST_TOKEN_PATH` signed with the consumer pair → `RequestToken`
//! 2. User approves at `AUTHORIZE_PATH?oauth_token=...` → verifier
//! 3. POST `ACCESS_TOKEN_PATH` signed with consumer + request token → `AccessToken`
//! 4. Token stored via `CredentialStore::begin_attempt()` + `replace_token()`

pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod signer;
pub mod token;

pub use credentials::{AttemptGuard, Credential, CredentialStore, KeyPair};
pub use endpoints::{ACCESS_TOKEN_PATH, AUTHORIZE_PATH, REQUEST_TOKEN_PATH, TwitterUrl};
pub use error::{Error, Result};
pub use signer::{OAuthNonce, SignedRequest, Signer, percent_encode, signature_base_string};
pub use token::{AccessToken, OAUTH_TOKEN, OAUTH_VERIFIER, RequestToken, TokenResponse};
