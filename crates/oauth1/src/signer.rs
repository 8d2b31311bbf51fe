//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Pure computation: given the method, URL, request parameters and the
//! consumer/token pairs, produce the `Authorization` header value and the
//! parameters that remain for the request body. No I/O happens here, so the
//! signature can be checked against known vectors without a network.
//!
//! The header carries only the generated protocol parameters (consumer key,
//! nonce, signature method, timestamp, signer token, version). Caller
//! parameters, `oauth_callback` and `oauth_verifier` included, are signed and
//! stay in the form body.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::RngExt;
use sha1::Sha1;
use url::Url;

use crate::credentials::KeyPair;
use crate::error::{Error, Result};

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// RFC 3986 unreserved characters pass through; everything else is escaped.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode per RFC 3986 (spaces become `%20`, never `+`).
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Per-request nonce and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthNonce {
    pub nonce: String,
    pub timestamp: u64,
}

impl OAuthNonce {
    /// Fresh nonce (16 random bytes, hex) stamped with the current unix time.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 16];
        rand::rng().fill(&mut bytes);
        let nonce = bytes.iter().map(|b| format!("{b:02x}")).collect();

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Signing(format!("system clock before unix epoch: {e}")))?
            .as_secs();

        Ok(Self { nonce, timestamp })
    }
}

/// Output of signing one request.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Value for the `Authorization` header (`OAuth k="v", ...`)
    pub authorization: String,
    /// Caller parameters, to be sent form-encoded in the body
    pub body_params: Vec<(String, String)>,
}

/// Signs requests for one consumer, optionally on behalf of a token.
///
/// Without a token the signing key is `consumer_secret&` (empty token secret),
/// which is what the request-token step requires.
#[derive(Debug, Clone, Copy)]
pub struct Signer<'a> {
    consumer: &'a KeyPair,
    token: Option<&'a KeyPair>,
}

impl<'a> Signer<'a> {
    pub fn new(consumer: &'a KeyPair, token: Option<&'a KeyPair>) -> Self {
        Self { consumer, token }
    }

    /// Sign with a freshly generated nonce and timestamp.
    pub fn sign(&self, method: &str, url: &Url, params: &[(String, String)]) -> Result<SignedRequest> {
        self.sign_with(method, url, params, &OAuthNonce::generate()?)
    }

    /// Sign with a caller-supplied nonce and timestamp.
    pub fn sign_with(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        nonce: &OAuthNonce,
    ) -> Result<SignedRequest> {
        let mut protocol = BTreeMap::new();
        protocol.insert("oauth_consumer_key".to_string(), self.consumer.key.clone());
        protocol.insert("oauth_nonce".to_string(), nonce.nonce.clone());
        protocol.insert(
            "oauth_signature_method".to_string(),
            SIGNATURE_METHOD.to_string(),
        );
        protocol.insert("oauth_timestamp".to_string(), nonce.timestamp.to_string());
        if let Some(token) = self.token {
            protocol.insert("oauth_token".to_string(), token.key.clone());
        }
        protocol.insert("oauth_version".to_string(), OAUTH_VERSION.to_string());

        let body_params = params.to_vec();

        let mut signed: Vec<(String, String)> = protocol
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        signed.extend(body_params.iter().cloned());

        let base_string = signature_base_string(method, url, &signed);
        let signing_key = format!(
            "{}&{}",
            percent_encode(self.consumer.secret.expose()),
            percent_encode(self.token.map(|t| t.secret.expose().as_str()).unwrap_or(""))
        );
        let signature = hmac_sha1(&signing_key, &base_string)?;
        protocol.insert("oauth_signature".to_string(), signature);

        let header = protocol
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(SignedRequest {
            authorization: format!("OAuth {header}"),
            body_params,
        })
    }
}

/// Build the signature base string: `METHOD&enc(url)&enc(params)`.
///
/// `params` are the protocol and body parameters; the URL's own query
/// parameters are added here. Pairs are sorted by encoded name, then by
/// encoded value.
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    pairs.extend(
        url.query_pairs()
            .map(|(k, v)| (percent_encode(&k), percent_encode(&v))),
    );
    pairs.sort();

    let param_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(&base_url(url)),
        percent_encode(&param_string)
    )
}

/// Scheme, host, non-default port and path; no query or fragment.
fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

/// base64(HMAC-SHA1(key, data))
fn hmac_sha1(key: &str, data: &str) -> Result<String> {
    type HmacSha1 = Hmac<Sha1>;

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Signing(format!("HMAC key rejected: {e}")))?;
    mac.update(data.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
