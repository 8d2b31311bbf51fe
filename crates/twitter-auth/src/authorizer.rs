//! Authorization orchestrator
//!
//! Drives `flow::handle_event` to completion for one attempt: executes each
//! action (signed POST, browser session, credential write) and feeds the
//! result back as the next event. Every failure ends the attempt; nothing is
//! retried.
//!
//! Attempts on the same `CredentialStore` are serialized by its attempt
//! guard: a second `authorize` while one is in flight returns `Error::Busy`
//! before any request is sent.

use std::sync::Arc;

use oauth1::{
    ACCESS_TOKEN_PATH, AccessToken, Credential, OAUTH_TOKEN, OAUTH_VERIFIER, REQUEST_TOKEN_PATH,
    RequestToken, TokenResponse, TwitterUrl,
};
use tracing::{Instrument, debug, info, info_span, warn};
use transport::HttpResponse;
use url::Url;
use uuid::Uuid;

use crate::client::SignedClient;
use crate::error::{Error, Result};
use crate::flow::{AuthAction, AuthEvent, AuthState, AuthorizeRequest, handle_event};
use crate::session::WebAuthSession;

/// Successful outcome: the new access token and the response that carried it.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub access_token: AccessToken,
    pub response: HttpResponse,
}

pub struct Authorizer {
    client: SignedClient,
    session: Arc<dyn WebAuthSession>,
}

impl Authorizer {
    pub fn new(client: SignedClient, session: Arc<dyn WebAuthSession>) -> Self {
        Self { client, session }
    }

    /// Snapshot of the stored credential (secrets stay redacted in Debug).
    pub async fn credential(&self) -> Credential {
        self.client.credential_store().snapshot().await
    }

    /// Run the full three-legged handshake.
    ///
    /// On success the credential store holds the new access token. On failure
    /// the store is left as it was.
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<Authorization> {
        let attempt_id = Uuid::new_v4();
        let span = info_span!("authorize", %attempt_id, callback = %request.callback_url);

        let result = self.run(request).instrument(span.clone()).await;

        let outcome = match &result {
            Ok((state, _)) => state.label(),
            Err(e) => e.kind().as_str(),
        };
        span.in_scope(|| debug!(outcome, "attempt finished"));
        metrics::counter!("oauth_authorize_total", "outcome" => outcome).increment(1);
        result.map(|(_, authorization)| authorization)
    }

    /// Drive one attempt to its terminal state. On success the returned state
    /// is `AuthState::Authorized`.
    async fn run(&self, request: AuthorizeRequest) -> Result<(AuthState, Authorization)> {
        let guard = self.client.credential_store().begin_attempt().ok_or_else(|| {
            warn!("authorization already in progress, rejecting");
            Error::Busy
        })?;

        let mut state = AuthState::Idle;
        let mut event = AuthEvent::Start(request);
        let mut exchange_response = None;

        loop {
            let from = state.label();
            let (next, action) = handle_event(state, event);
            state = next;
            debug!(from, to = state.label(), "state transition");

            event = match action {
                AuthAction::FetchRequestToken { callback_url } => {
                    match self.request_token(&callback_url).await {
                        Ok((token, _)) => AuthEvent::RequestTokenReceived(token),
                        Err(e) => AuthEvent::StepFailed(e),
                    }
                }
                AuthAction::OpenSession(session) => {
                    info!(url = %session.url, ephemeral = session.ephemeral, "waiting for user approval");
                    AuthEvent::SessionFinished(self.session.start(session).await)
                }
                AuthAction::ExchangeToken { request_token } => {
                    match self.exchange_access_token(&request_token).await {
                        Ok((token, response)) => {
                            exchange_response = Some(response);
                            AuthEvent::AccessTokenReceived(token)
                        }
                        Err(e) => AuthEvent::StepFailed(e),
                    }
                }
                AuthAction::StoreToken { access_token } => {
                    let response = exchange_response.take().ok_or_else(|| {
                        Error::Internal("authorized without an access-token response".into())
                    })?;
                    guard.replace_token(access_token.clone()).await;
                    info!(
                        user_id = access_token.user_id().unwrap_or_default(),
                        screen_name = access_token.screen_name().unwrap_or_default(),
                        "authorization complete"
                    );
                    return Ok((
                        state,
                        Authorization {
                            access_token,
                            response,
                        },
                    ));
                }
                AuthAction::Fail(err) => {
                    warn!(error = %err, kind = err.kind().as_str(), "authorization failed");
                    return Err(err);
                }
                AuthAction::None => {
                    return Err(Error::Internal(format!(
                        "no transition out of {}",
                        state.label()
                    )));
                }
            };
        }
    }

    /// Step 1: obtain a request token for `callback_url`.
    pub async fn request_token(&self, callback_url: &Url) -> Result<(RequestToken, HttpResponse)> {
        let response = self
            .client
            .post_with_token(
                REQUEST_TOKEN_PATH,
                TwitterUrl::Oauth,
                &[("oauth_callback", callback_url.as_str())],
                None,
            )
            .await?;
        let token = RequestToken::from(TokenResponse::parse(&response.body)?);
        debug!(request_token = token.key(), "request token received");
        Ok((token, response))
    }

    /// Step 3: redeem a verified request token.
    ///
    /// Fails with `BadOAuthResponse`, without sending anything, if the token
    /// carries no verifier.
    pub async fn exchange_access_token(
        &self,
        request_token: &RequestToken,
    ) -> Result<(AccessToken, HttpResponse)> {
        let Some(verifier) = request_token.verifier() else {
            return Err(Error::BadOAuthResponse(
                "request token has no verifier; refusing access-token exchange".into(),
            ));
        };

        let response = self
            .client
            .post_with_token(
                ACCESS_TOKEN_PATH,
                TwitterUrl::Oauth,
                &[(OAUTH_TOKEN, request_token.key()), (OAUTH_VERIFIER, verifier)],
                Some(request_token.pair()),
            )
            .await?;
        let token = AccessToken::from(TokenResponse::parse(&response.body)?);
        Ok((token, response))
    }
}
