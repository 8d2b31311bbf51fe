//! Browser sessions for a terminal host
//!
//! Two ways to get the user through Twitter's authorization page:
//! - `ConsoleSession`: print the URL, read back the redirected callback URL
//!   that the user pastes into the terminal
//! - `LoopbackSession`: callback points at a local axum listener, which
//!   captures the redirect itself

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use twitter_auth::{SessionOutcome, SessionRequest, WebAuthSession};
use url::Url;

use crate::error::{Error, Result};

/// Tell the user where to go.
fn announce(request: &SessionRequest) {
    if request.ephemeral {
        debug!("ephemeral session requested; use a private browser window");
    }
    eprintln!("\nOpen this page in a browser and authorize the app:\n\n  {}\n", request.url);
}

/// Interpret one line typed at the prompt.
fn parse_pasted_callback(line: &str, callback_scheme: &str) -> SessionOutcome {
    let line = line.trim();
    if line.is_empty() {
        return SessionOutcome::Cancelled;
    }
    let url = match Url::parse(line) {
        Ok(url) => url,
        Err(e) => return SessionOutcome::Failed(format!("not a URL: {e}")),
    };
    if url.scheme() != callback_scheme {
        return SessionOutcome::Failed(format!(
            "expected a {callback_scheme}:// URL, got {}://",
            url.scheme()
        ));
    }
    SessionOutcome::Callback(url)
}

/// Stdin/stderr session.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSession;

impl WebAuthSession for ConsoleSession {
    fn start(
        &self,
        request: SessionRequest,
    ) -> Pin<Box<dyn Future<Output = SessionOutcome> + Send + '_>> {
        Box::pin(async move {
            announce(&request);
            eprintln!(
                "After approving, paste the {}:// URL the browser was sent to (empty line cancels):",
                request.callback_scheme
            );

            let mut line = String::new();
            let mut stdin = BufReader::new(tokio::io::stdin());
            match stdin.read_line(&mut line).await {
                Ok(0) => SessionOutcome::Cancelled,
                Ok(_) => parse_pasted_callback(&line, &request.callback_scheme),
                Err(e) => SessionOutcome::Failed(format!("reading stdin: {e}")),
            }
        })
    }
}

#[derive(Clone)]
struct CaptureState {
    base: Url,
    path: String,
    tx: Arc<Mutex<Option<oneshot::Sender<Url>>>>,
}

/// Single-use local listener that receives the OAuth redirect.
pub struct LoopbackSession {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    callback_path: String,
}

impl LoopbackSession {
    /// Bind the listener up front so a busy port fails before any network call.
    ///
    /// Only requests to `callback_path` complete the session; anything else
    /// (favicon probes, stray tabs) gets a 404.
    pub async fn bind(addr: SocketAddr, callback_path: impl Into<String>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::CallbackListener(format!("binding {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::CallbackListener(e.to_string()))?;
        info!(%local_addr, "callback listener bound");
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            callback_path: callback_path.into(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn capture(State(state): State<CaptureState>, uri: Uri) -> Response {
    if uri.path() != state.path {
        debug!(path = %uri.path(), "ignoring request outside the callback path");
        return StatusCode::NOT_FOUND.into_response();
    }

    let target = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = match state.base.join(target) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "unparseable callback request");
            return (StatusCode::BAD_REQUEST, "malformed callback").into_response();
        }
    };

    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(url);
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CONNECTION, "close"),
        ],
        "fetchmee: authorization received, you can close this window.\n",
    )
        .into_response()
}

impl WebAuthSession for LoopbackSession {
    fn start(
        &self,
        request: SessionRequest,
    ) -> Pin<Box<dyn Future<Output = SessionOutcome> + Send + '_>> {
        Box::pin(async move {
            let Some(listener) = self.listener.lock().await.take() else {
                return SessionOutcome::Failed("callback listener already used".into());
            };
            let base = match Url::parse(&format!("http://{}/", self.local_addr)) {
                Ok(base) => base,
                Err(e) => return SessionOutcome::Failed(format!("listener address: {e}")),
            };

            let (tx, rx) = oneshot::channel();
            let state = CaptureState {
                base,
                path: self.callback_path.clone(),
                tx: Arc::new(Mutex::new(Some(tx))),
            };
            let app = Router::new().fallback(capture).with_state(state);

            // Dropping stop_tx (including when this future is dropped) stops the server.
            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            let server = tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = stop_rx.await;
                    })
                    .await
            });

            announce(&request);
            eprintln!("Waiting for the browser to return to {} ...", self.local_addr());

            let outcome = match rx.await {
                Ok(url) if url.scheme() == request.callback_scheme => SessionOutcome::Callback(url),
                Ok(url) => SessionOutcome::Failed(format!(
                    "callback arrived as {}:// but {}:// was requested",
                    url.scheme(),
                    request.callback_scheme
                )),
                Err(_) => SessionOutcome::Failed(
                    "callback listener stopped before the redirect arrived".into(),
                ),
            };

            let _ = stop_tx.send(());
            match server.await {
                Ok(Ok(())) => debug!("callback listener stopped"),
                Ok(Err(e)) => warn!(error = %e, "callback listener error"),
                Err(e) => warn!(error = %e, "callback listener task failed"),
            }
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_request(scheme: &str) -> SessionRequest {
        SessionRequest {
            url: Url::parse("https://api.twitter.com/oauth/authorize?oauth_token=tok1").unwrap(),
            callback_scheme: scheme.to_string(),
            ephemeral: false,
        }
    }

    #[test]
    fn pasted_callback_is_accepted() {
        let outcome = parse_pasted_callback(
            "  fetchmee://success?oauth_token=tok1&oauth_verifier=ver1\n",
            "fetchmee",
        );
        match outcome {
            SessionOutcome::Callback(url) => {
                assert_eq!(url.scheme(), "fetchmee");
                assert_eq!(url.query(), Some("oauth_token=tok1&oauth_verifier=ver1"));
            }
            other => panic!("expected Callback, got {other:?}"),
        }
    }

    #[test]
    fn empty_line_cancels() {
        assert_eq!(parse_pasted_callback("\n", "fetchmee"), SessionOutcome::Cancelled);
        assert_eq!(parse_pasted_callback("   ", "fetchmee"), SessionOutcome::Cancelled);
    }

    #[test]
    fn other_scheme_fails() {
        let outcome = parse_pasted_callback("https://example.com/?oauth_verifier=v", "fetchmee");
        match outcome {
            SessionOutcome::Failed(msg) => assert!(msg.contains("fetchmee://"), "got: {msg}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn garbage_fails() {
        assert!(matches!(
            parse_pasted_callback("not a url", "fetchmee"),
            SessionOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn loopback_captures_callback_request() {
        let session = Arc::new(
            LoopbackSession::bind("127.0.0.1:0".parse().unwrap(), "/callback")
                .await
                .unwrap(),
        );
        let addr = session.local_addr();

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.start(session_request("http")).await })
        };

        let client = reqwest::Client::new();
        let stray = client
            .get(format!("http://{addr}/favicon.ico"))
            .send()
            .await
            .unwrap();
        assert_eq!(stray.status().as_u16(), 404);

        let resp = client
            .get(format!(
                "http://{addr}/callback?oauth_token=tok1&oauth_verifier=ver1"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert!(resp.text().await.unwrap().contains("authorization received"));

        match task.await.unwrap() {
            SessionOutcome::Callback(url) => {
                assert_eq!(url.path(), "/callback");
                assert_eq!(url.query(), Some("oauth_token=tok1&oauth_verifier=ver1"));
            }
            other => panic!("expected Callback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn loopback_is_single_use() {
        let session = Arc::new(
            LoopbackSession::bind("127.0.0.1:0".parse().unwrap(), "/callback")
                .await
                .unwrap(),
        );
        let addr = session.local_addr();

        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.start(session_request("http")).await })
        };
        reqwest::get(format!("http://{addr}/callback?oauth_verifier=v"))
            .await
            .unwrap();
        assert!(matches!(task.await.unwrap(), SessionOutcome::Callback(_)));

        match session.start(session_request("http")).await {
            SessionOutcome::Failed(msg) => assert!(msg.contains("already used")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn loopback_bind_conflict_is_reported() {
        let first = LoopbackSession::bind("127.0.0.1:0".parse().unwrap(), "/callback")
            .await
            .unwrap();
        let err = LoopbackSession::bind(first.local_addr(), "/callback")
            .await
            .err()
            .expect("second bind on the same port must fail");
        assert!(matches!(err, Error::CallbackListener(_)));
    }
}
