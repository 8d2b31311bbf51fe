//! OAuth 1.0a signed HTTP client
//!
//! Signs each request with the `oauth1::Signer` and hands the bytes to a
//! `Transport`. The client reads the shared credential store but never
//! writes it; replacing the token is the orchestrator's job.

use std::sync::Arc;

use oauth1::{CredentialStore, KeyPair, Signer, TwitterUrl};
use transport::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use transport::{HeaderMap, HttpRequest, HttpResponse, Method, Transport};
use tracing::debug;
use url::form_urlencoded;

use crate::error::{Error, Result};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct SignedClient {
    store: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
}

impl SignedClient {
    pub fn new(store: Arc<CredentialStore>, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// POST signed with the current credential: consumer pair plus the stored
    /// access token, or an empty token secret when unauthenticated.
    pub async fn post(
        &self,
        path: &str,
        base: TwitterUrl,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let request = {
            let credential = self.store.snapshot().await;
            build_request(credential.signer(), path, base, params)?
        };
        self.send(request).await
    }

    /// POST signed with the consumer pair and an explicit token instead of the
    /// stored one (`None` signs with the consumer pair alone).
    pub async fn post_with_token(
        &self,
        path: &str,
        base: TwitterUrl,
        params: &[(&str, &str)],
        token: Option<&KeyPair>,
    ) -> Result<HttpResponse> {
        let request = {
            let credential = self.store.snapshot().await;
            let signer = match token {
                Some(token) => credential.signer_for(token),
                None => Signer::new(credential.consumer(), None),
            };
            build_request(signer, path, base, params)?
        };
        self.send(request).await
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(url = %request.url, "sending signed request");
        Ok(self.transport.send(request).await?)
    }
}

/// Sign and encode a POST. Pure apart from the nonce/timestamp.
fn build_request(
    signer: Signer<'_>,
    path: &str,
    base: TwitterUrl,
    params: &[(&str, &str)],
) -> Result<HttpRequest> {
    let url = base.join(path)?;
    let params: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let signed = signer.sign(Method::POST.as_str(), &url, &params)?;

    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(signed.body_params.iter())
        .finish();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&signed.authorization)
            .map_err(|e| Error::Signing(format!("authorization header is not ASCII: {e}")))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

    Ok(HttpRequest {
        method: Method::POST,
        url,
        headers,
        body: body.into_bytes(),
    })
}
