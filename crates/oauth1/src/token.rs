//! Request and access tokens, and the form-encoded token response parser
//!
//! Both token endpoints answer with an `application/x-www-form-urlencoded`
//! body such as `oauth_token=...&oauth_token_secret=...&user_id=...`. The
//! parser extracts the mandatory pair and keeps every other field so callers
//! can read provider-specific extras (`user_id`, `screen_name`, ...).

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::credentials::KeyPair;
use crate::error::{Error, Result};

pub const OAUTH_TOKEN: &str = "oauth_token";
pub const OAUTH_TOKEN_SECRET: &str = "oauth_token_secret";
pub const OAUTH_VERIFIER: &str = "oauth_verifier";
pub const OAUTH_CALLBACK_CONFIRMED: &str = "oauth_callback_confirmed";

const USER_ID: &str = "user_id";
const SCREEN_NAME: &str = "screen_name";

/// Decoded token endpoint response: the key pair plus all remaining fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub pair: KeyPair,
    pub fields: BTreeMap<String, String>,
}

impl TokenResponse {
    /// Parse a raw response body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| Error::Parse(format!("response body is not UTF-8: {e}")))?;
        Self::parse_str(text)
    }

    /// Parse a form-encoded string. Percent escapes and `+` are decoded; when a
    /// name repeats, the first occurrence wins.
    pub fn parse_str(text: &str) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for (name, value) in form_urlencoded::parse(text.trim().as_bytes()) {
            fields
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        let key = take_required(&mut fields, OAUTH_TOKEN)?;
        let secret = take_required(&mut fields, OAUTH_TOKEN_SECRET)?;

        Ok(Self {
            pair: KeyPair::new(key, secret),
            fields,
        })
    }
}

fn take_required(fields: &mut BTreeMap<String, String>, name: &str) -> Result<String> {
    match fields.remove(name) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(Error::Parse(format!("{name} is empty"))),
        None => Err(Error::Parse(format!("missing {name}"))),
    }
}

/// Temporary credential used only to obtain user approval.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestToken {
    pair: KeyPair,
    verifier: Option<String>,
    callback_confirmed: Option<bool>,
}

impl RequestToken {
    pub fn new(pair: KeyPair) -> Self {
        Self {
            pair,
            verifier: None,
            callback_confirmed: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.pair.key
    }

    pub fn pair(&self) -> &KeyPair {
        &self.pair
    }

    pub fn verifier(&self) -> Option<&str> {
        self.verifier.as_deref()
    }

    /// `oauth_callback_confirmed` as reported by the server, if it was sent.
    pub fn callback_confirmed(&self) -> Option<bool> {
        self.callback_confirmed
    }

    /// Attach the verifier returned by the authorization page.
    pub fn with_verifier(self, verifier: impl Into<String>) -> Self {
        Self {
            verifier: Some(verifier.into()),
            ..self
        }
    }
}

impl From<TokenResponse> for RequestToken {
    fn from(response: TokenResponse) -> Self {
        let callback_confirmed = response
            .fields
            .get(OAUTH_CALLBACK_CONFIRMED)
            .map(|v| v == "true");
        Self {
            pair: response.pair,
            verifier: None,
            callback_confirmed,
        }
    }
}

/// Durable credential for an authorized user session.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pair: KeyPair,
    user_id: Option<String>,
    screen_name: Option<String>,
    extra: BTreeMap<String, String>,
}

impl AccessToken {
    pub fn new(pair: KeyPair) -> Self {
        Self {
            pair,
            user_id: None,
            screen_name: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.pair.key
    }

    pub fn pair(&self) -> &KeyPair {
        &self.pair
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn screen_name(&self) -> Option<&str> {
        self.screen_name.as_deref()
    }

    /// Response fields other than the pair, `user_id` and `screen_name`.
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Encode back into the form the token endpoint returned it in.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer
            .append_pair(OAUTH_TOKEN, &self.pair.key)
            .append_pair(OAUTH_TOKEN_SECRET, self.pair.secret.expose());
        if let Some(user_id) = &self.user_id {
            serializer.append_pair(USER_ID, user_id);
        }
        if let Some(screen_name) = &self.screen_name {
            serializer.append_pair(SCREEN_NAME, screen_name);
        }
        for (name, value) in &self.extra {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }
}

impl From<TokenResponse> for AccessToken {
    fn from(response: TokenResponse) -> Self {
        let mut extra = response.fields;
        let user_id = extra.remove(USER_ID);
        let screen_name = extra.remove(SCREEN_NAME);
        Self {
            pair: response.pair,
            user_id,
            screen_name,
            extra,
        }
    }
}
