//! Authorization handshake state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! The `Authorizer` executes the I/O implied by each action and feeds the
//! result back as the next event.
//!
//! ```text
//! Idle → RequestingToken → AwaitingUserApproval → ExchangingToken → Authorized
//!              └──────────────────┴──────────────────────┴──→ Failed
//! ```

use oauth1::{AUTHORIZE_PATH, AccessToken, OAUTH_TOKEN, OAUTH_VERIFIER, RequestToken, TwitterUrl};
use url::Url;

use crate::error::{Error, FailureKind};
use crate::session::{SessionOutcome, SessionRequest};

/// Parameters of one `authorize` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    /// URL under a scheme the host owns; the browser returns here
    pub callback_url: Url,
    /// Ask Twitter to show the login form even if a session exists
    pub force_login: bool,
    /// Ask the host for a private browsing session
    pub ephemeral_session: bool,
}

impl AuthorizeRequest {
    pub fn new(callback_url: Url) -> Self {
        Self {
            callback_url,
            force_login: false,
            ephemeral_session: false,
        }
    }
}

/// Handshake states.
#[derive(Debug)]
pub enum AuthState {
    Idle,
    RequestingToken {
        request: AuthorizeRequest,
    },
    AwaitingUserApproval {
        request_token: RequestToken,
    },
    ExchangingToken {
        request_token: RequestToken,
    },
    Authorized {
        access_token: AccessToken,
    },
    Failed {
        kind: FailureKind,
    },
}

impl AuthState {
    /// State label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Idle => "idle",
            AuthState::RequestingToken { .. } => "requesting_token",
            AuthState::AwaitingUserApproval { .. } => "awaiting_user_approval",
            AuthState::ExchangingToken { .. } => "exchanging_token",
            AuthState::Authorized { .. } => "authorized",
            AuthState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Authorized { .. } | AuthState::Failed { .. })
    }
}

/// Events that drive state transitions.
#[derive(Debug)]
pub enum AuthEvent {
    /// Caller invoked authorize
    Start(AuthorizeRequest),
    /// Request-token response parsed
    RequestTokenReceived(RequestToken),
    /// Browser session ended
    SessionFinished(SessionOutcome),
    /// Access-token response parsed
    AccessTokenReceived(AccessToken),
    /// The I/O for the current step failed
    StepFailed(Error),
}

/// Actions the caller should execute after a state transition.
#[derive(Debug)]
pub enum AuthAction {
    /// POST `oauth/request_token` with `oauth_callback`
    FetchRequestToken { callback_url: Url },
    /// Present the authorization page and wait for the user
    OpenSession(SessionRequest),
    /// POST `oauth/access_token` with the verified request token
    ExchangeToken { request_token: RequestToken },
    /// Replace the stored token and report success
    StoreToken { access_token: AccessToken },
    /// Report this error to the caller
    Fail(Error),
    /// No-op
    None,
}

/// `https://api.twitter.com/oauth/authorize?oauth_token=<key>[&force_login=true]`
pub fn authorization_url(token_key: &str, force_login: bool) -> Url {
    let mut url = TwitterUrl::Oauth.url();
    url.set_path(AUTHORIZE_PATH);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair(OAUTH_TOKEN, token_key);
        if force_login {
            query.append_pair("force_login", "true");
        }
    }
    url
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: AuthState, event: AuthEvent) -> (AuthState, AuthAction) {
    match (state, event) {
        // --- Idle ---
        (AuthState::Idle, AuthEvent::Start(request)) => {
            let callback_url = request.callback_url.clone();
            (
                AuthState::RequestingToken { request },
                AuthAction::FetchRequestToken { callback_url },
            )
        }

        // --- RequestingToken ---
        (AuthState::RequestingToken { request }, AuthEvent::RequestTokenReceived(token)) => {
            if token.callback_confirmed() == Some(false) {
                return fail(Error::BadOAuthResponse(
                    "server did not confirm the callback URL".into(),
                ));
            }
            let session = SessionRequest {
                url: authorization_url(token.key(), request.force_login),
                callback_scheme: request.callback_url.scheme().to_string(),
                ephemeral: request.ephemeral_session,
            };
            (
                AuthState::AwaitingUserApproval {
                    request_token: token,
                },
                AuthAction::OpenSession(session),
            )
        }

        // --- AwaitingUserApproval ---
        (
            AuthState::AwaitingUserApproval { request_token },
            AuthEvent::SessionFinished(outcome),
        ) => match outcome {
            SessionOutcome::Callback(url) => match verifier_from_callback(&url, &request_token) {
                Ok(verifier) => {
                    let request_token = request_token.with_verifier(verifier);
                    (
                        AuthState::ExchangingToken {
                            request_token: request_token.clone(),
                        },
                        AuthAction::ExchangeToken { request_token },
                    )
                }
                Err(err) => fail(err),
            },
            SessionOutcome::Failed(reason) => fail(Error::Cancelled(format!(
                "authorization session failed: {reason}"
            ))),
            SessionOutcome::Cancelled => {
                fail(Error::Cancelled("user dismissed the authorization session".into()))
            }
        },

        // --- ExchangingToken ---
        (AuthState::ExchangingToken { .. }, AuthEvent::AccessTokenReceived(access_token)) => (
            AuthState::Authorized {
                access_token: access_token.clone(),
            },
            AuthAction::StoreToken { access_token },
        ),

        // --- Any in-flight state + step failure = Failed ---
        (
            AuthState::RequestingToken { .. }
            | AuthState::AwaitingUserApproval { .. }
            | AuthState::ExchangingToken { .. },
            AuthEvent::StepFailed(err),
        ) => fail(err),

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, AuthAction::None),
    }
}

fn fail(err: Error) -> (AuthState, AuthAction) {
    (AuthState::Failed { kind: err.kind() }, AuthAction::Fail(err))
}

/// Pull `oauth_verifier` out of the callback query.
///
/// No verifier (including Twitter's `denied=` redirect) means the user did
/// not approve. A callback for a different request token is a contract
/// violation.
fn verifier_from_callback(url: &Url, request_token: &RequestToken) -> Result<String, Error> {
    let mut verifier = None;
    let mut returned_token = None;
    let mut denied = false;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            OAUTH_VERIFIER if !value.is_empty() => verifier = Some(value.into_owned()),
            OAUTH_TOKEN => returned_token = Some(value.into_owned()),
            "denied" => denied = true,
            _ => {}
        }
    }

    if let Some(returned) = returned_token
        && returned != request_token.key()
    {
        return Err(Error::BadOAuthResponse(format!(
            "callback is for request token {returned}, expected {}",
            request_token.key()
        )));
    }

    match verifier {
        Some(verifier) => Ok(verifier),
        None if denied => Err(Error::Cancelled("user denied access".into())),
        None => Err(Error::Cancelled(
            "user cancelled login from Twitter (no oauth_verifier in callback)".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth1::KeyPair;
    use transport::TransportError;

    fn callback() -> Url {
        Url::parse("fetchmee://success").unwrap()
    }

    fn request_token(key: &str) -> RequestToken {
        RequestToken::new(KeyPair::new(key, "sec1"))
    }

    fn awaiting(key: &str) -> AuthState {
        AuthState::AwaitingUserApproval {
            request_token: request_token(key),
        }
    }

    fn session_callback(url: &str) -> AuthEvent {
        AuthEvent::SessionFinished(SessionOutcome::Callback(Url::parse(url).unwrap()))
    }

    #[test]
    fn idle_to_requesting_on_start() {
        let (state, action) = handle_event(
            AuthState::Idle,
            AuthEvent::Start(AuthorizeRequest::new(callback())),
        );
        assert!(matches!(state, AuthState::RequestingToken { .. }));
        match action {
            AuthAction::FetchRequestToken { callback_url } => {
                assert_eq!(callback_url.as_str(), "fetchmee://success")
            }
            other => panic!("expected FetchRequestToken, got {other:?}"),
        }
    }

    #[test]
    fn request_token_opens_session_with_callback_scheme() {
        let request = AuthorizeRequest {
            callback_url: callback(),
            force_login: true,
            ephemeral_session: true,
        };
        let (state, action) = handle_event(
            AuthState::RequestingToken { request },
            AuthEvent::RequestTokenReceived(request_token("tok1")),
        );
        assert!(matches!(state, AuthState::AwaitingUserApproval { .. }));
        match action {
            AuthAction::OpenSession(session) => {
                assert_eq!(
                    session.url.as_str(),
                    "https://api.twitter.com/oauth/authorize?oauth_token=tok1&force_login=true"
                );
                assert_eq!(session.callback_scheme, "fetchmee");
                assert!(session.ephemeral);
            }
            other => panic!("expected OpenSession, got {other:?}"),
        }
    }

    #[test]
    fn authorization_url_omits_force_login_by_default() {
        assert_eq!(
            authorization_url("abc", false).as_str(),
            "https://api.twitter.com/oauth/authorize?oauth_token=abc"
        );
    }

    #[test]
    fn unconfirmed_callback_fails() {
        let token: RequestToken = oauth1::TokenResponse::parse_str(
            "oauth_token=tok1&oauth_token_secret=s&oauth_callback_confirmed=false",
        )
        .unwrap()
        .into();
        let (state, action) = handle_event(
            AuthState::RequestingToken {
                request: AuthorizeRequest::new(callback()),
            },
            AuthEvent::RequestTokenReceived(token),
        );
        assert!(matches!(
            state,
            AuthState::Failed {
                kind: FailureKind::BadOAuthResponse
            }
        ));
        assert!(matches!(action, AuthAction::Fail(Error::BadOAuthResponse(_))));
    }

    #[test]
    fn callback_with_verifier_moves_to_exchange() {
        let (state, action) = handle_event(
            awaiting("tok1"),
            session_callback("fetchmee://success?oauth_token=tok1&oauth_verifier=ver1"),
        );
        match state {
            AuthState::ExchangingToken { request_token } => {
                assert_eq!(request_token.verifier(), Some("ver1"))
            }
            other => panic!("expected ExchangingToken, got {other:?}"),
        }
        match action {
            AuthAction::ExchangeToken { request_token } => {
                assert_eq!(request_token.key(), "tok1");
                assert_eq!(request_token.verifier(), Some("ver1"));
            }
            other => panic!("expected ExchangeToken, got {other:?}"),
        }
    }

    #[test]
    fn callback_without_verifier_is_cancelled() {
        let (state, action) = handle_event(
            awaiting("tok1"),
            session_callback("fetchmee://success?oauth_token=tok1"),
        );
        assert!(matches!(
            state,
            AuthState::Failed {
                kind: FailureKind::Cancelled
            }
        ));
        assert!(matches!(action, AuthAction::Fail(Error::Cancelled(_))));
    }

    #[test]
    fn empty_verifier_is_cancelled() {
        let (state, _) = handle_event(
            awaiting("tok1"),
            session_callback("fetchmee://success?oauth_verifier="),
        );
        assert!(matches!(
            state,
            AuthState::Failed {
                kind: FailureKind::Cancelled
            }
        ));
    }

    #[test]
    fn denied_callback_is_cancelled() {
        let (_, action) = handle_event(awaiting("tok1"), session_callback("fetchmee://success?denied=tok1"));
        match action {
            AuthAction::Fail(Error::Cancelled(msg)) => assert!(msg.contains("denied")),
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn callback_for_other_token_is_bad_response() {
        let (state, _) = handle_event(
            awaiting("tok1"),
            session_callback("fetchmee://success?oauth_token=evil&oauth_verifier=ver1"),
        );
        assert!(matches!(
            state,
            AuthState::Failed {
                kind: FailureKind::BadOAuthResponse
            }
        ));
    }

    #[test]
    fn session_error_and_dismissal_are_cancelled() {
        for outcome in [
            SessionOutcome::Failed("presentation anchor missing".into()),
            SessionOutcome::Cancelled,
        ] {
            let (state, action) =
                handle_event(awaiting("tok1"), AuthEvent::SessionFinished(outcome));
            assert!(matches!(
                state,
                AuthState::Failed {
                    kind: FailureKind::Cancelled
                }
            ));
            assert!(matches!(action, AuthAction::Fail(Error::Cancelled(_))));
        }
    }

    #[test]
    fn access_token_authorizes() {
        let (state, action) = handle_event(
            AuthState::ExchangingToken {
                request_token: request_token("tok1").with_verifier("ver1"),
            },
            AuthEvent::AccessTokenReceived(oauth1::AccessToken::new(KeyPair::new("tok2", "sec2"))),
        );
        assert!(state.is_terminal());
        match state {
            AuthState::Authorized { access_token } => assert_eq!(access_token.key(), "tok2"),
            other => panic!("expected Authorized, got {other:?}"),
        }
        assert!(matches!(action, AuthAction::StoreToken { .. }));
    }

    #[test]
    fn step_failure_from_each_in_flight_state() {
        let states = [
            AuthState::RequestingToken {
                request: AuthorizeRequest::new(callback()),
            },
            awaiting("tok1"),
            AuthState::ExchangingToken {
                request_token: request_token("tok1").with_verifier("v"),
            },
        ];
        for state in states {
            let (state, action) = handle_event(
                state,
                AuthEvent::StepFailed(Error::Transport(TransportError::Request("reset".into()))),
            );
            assert!(matches!(
                state,
                AuthState::Failed {
                    kind: FailureKind::Transport
                }
            ));
            assert!(matches!(action, AuthAction::Fail(Error::Transport(_))));
        }
    }

    #[test]
    fn unexpected_event_keeps_state() {
        let (state, action) = handle_event(
            AuthState::Idle,
            AuthEvent::RequestTokenReceived(request_token("tok1")),
        );
        assert!(matches!(state, AuthState::Idle));
        assert!(matches!(action, AuthAction::None));

        let (state, action) = handle_event(
            AuthState::Failed {
                kind: FailureKind::Cancelled,
            },
            AuthEvent::Start(AuthorizeRequest::new(callback())),
        );
        assert!(matches!(state, AuthState::Failed { .. }));
        assert!(matches!(action, AuthAction::None));
    }
}
