//! Key pairs and the in-memory credential holder
//!
//! The consumer pair is fixed at construction. The access token slot starts
//! empty (app-only signing) and is filled by a completed authorization. A
//! tokio Mutex guards the credential; a second Mutex acts as the attempt
//! guard so that only one authorization at a time may write the token.

use common::Secret;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::signer::Signer;
use crate::token::AccessToken;

/// A key and its secret: the consumer identity, or a request/access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub key: String,
    pub secret: Secret<String>,
}

impl KeyPair {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: Secret::new(secret.into()),
        }
    }
}

/// Consumer identity plus the access token, if authorized.
#[derive(Debug, Clone)]
pub struct Credential {
    consumer: KeyPair,
    token: Option<AccessToken>,
}

impl Credential {
    pub fn new(consumer: KeyPair) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    pub fn with_token(consumer: KeyPair, token: AccessToken) -> Self {
        Self {
            consumer,
            token: Some(token),
        }
    }

    pub fn consumer(&self) -> &KeyPair {
        &self.consumer
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Signer for this credential: consumer pair plus access token pair, if any.
    pub fn signer(&self) -> Signer<'_> {
        Signer::new(&self.consumer, self.token.as_ref().map(AccessToken::pair))
    }

    /// Signer for the consumer and an explicit token (the request token during
    /// the access-token exchange).
    pub fn signer_for<'a>(&'a self, token: &'a KeyPair) -> Signer<'a> {
        Signer::new(&self.consumer, Some(token))
    }
}

/// Shared, mutex-guarded credential holder.
///
/// Single-writer policy: the token can only be replaced through an
/// `AttemptGuard`, and at most one guard exists at a time.
pub struct CredentialStore {
    state: Mutex<Credential>,
    attempt: Mutex<()>,
}

impl CredentialStore {
    /// Unauthenticated store for the given consumer.
    pub fn new(consumer: KeyPair) -> Self {
        Self::from_credential(Credential::new(consumer))
    }

    /// Store that is already authorized (token obtained earlier).
    pub fn with_access_token(consumer: KeyPair, token: AccessToken) -> Self {
        Self::from_credential(Credential::with_token(consumer, token))
    }

    fn from_credential(credential: Credential) -> Self {
        Self {
            state: Mutex::new(credential),
            attempt: Mutex::new(()),
        }
    }

    /// Clone of the current credential.
    pub async fn snapshot(&self) -> Credential {
        self.state.lock().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.is_authenticated()
    }

    /// Claim the right to write the token. Returns `None` while another
    /// attempt holds it.
    pub fn begin_attempt(&self) -> Option<AttemptGuard<'_>> {
        let lock = self.attempt.try_lock().ok()?;
        debug!("credential attempt guard acquired");
        Some(AttemptGuard { store: self, _lock: lock })
    }
}

/// Exclusive write access to a `CredentialStore` for one authorization attempt.
pub struct AttemptGuard<'a> {
    store: &'a CredentialStore,
    _lock: MutexGuard<'a, ()>,
}

impl AttemptGuard<'_> {
    /// Replace the stored access token.
    pub async fn replace_token(&self, token: AccessToken) {
        let mut state = self.store.state.lock().await;
        info!(
            token = %token.key(),
            user_id = token.user_id().unwrap_or_default(),
            "stored access token"
        );
        state.token = Some(token);
    }
}
