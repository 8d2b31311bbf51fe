//! Fetchmee Twitter login
//!
//! Single-binary host for the OAuth 1.0a handshake:
//! 1. Loads the consumer identity and handshake options
//! 2. Obtains a request token from Twitter
//! 3. Sends the user through the authorization page (console or loopback)
//! 4. Exchanges the verifier for an access token and prints the identity

mod config;
mod error;
mod session;

use anyhow::{Context, Result};
use oauth1::{CredentialStore, KeyPair};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::ReqwestTransport;
use twitter_auth::{Authorization, Authorizer, SignedClient, WebAuthSession};

use crate::config::{Config, SessionMode};
use crate::session::{ConsoleSession, LoopbackSession};

/// What gets printed on success. The token secret only appears with `--print-token`.
#[derive(Debug, Serialize)]
struct LoginSummary<'a> {
    user_id: Option<&'a str>,
    screen_name: Option<&'a str>,
    oauth_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<String>,
}

impl<'a> LoginSummary<'a> {
    fn new(authorization: &'a Authorization, print_token: bool) -> Self {
        let token = &authorization.access_token;
        Self {
            user_id: token.user_id(),
            screen_name: token.screen_name(),
            oauth_token: token.key(),
            credentials: print_token.then(|| token.to_query_string()),
        }
    }
}

/// Pick the browser session for the configured mode.
async fn build_session(config: &Config) -> Result<Arc<dyn WebAuthSession>> {
    let session: Arc<dyn WebAuthSession> = match config.session.mode {
        SessionMode::Console => Arc::new(ConsoleSession),
        SessionMode::Loopback => {
            let callback = config.callback_url()?;
            Arc::new(LoopbackSession::bind(config.session.listen_addr, callback.path()).await?)
        }
    };
    Ok(session)
}

/// Wire the credential store, transport and session into an `Authorizer`.
async fn build_authorizer(config: &Config) -> Result<Authorizer> {
    let secret = config
        .consumer
        .secret
        .clone()
        .context("consumer secret not resolved")?;
    let consumer = KeyPair {
        key: config.consumer.key.clone(),
        secret,
    };
    let store = Arc::new(CredentialStore::new(consumer));

    let timeout = Duration::from_secs(config.http.timeout_secs);
    let client = reqwest::Client::builder()
        .user_agent(concat!("fetchmee-login/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;
    let transport = Arc::new(ReqwestTransport::new(client, timeout));

    let session = build_session(config).await?;
    Ok(Authorizer::new(SignedClient::new(store, transport), session))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("starting fetchmee-login");

    // CLI: simple --config / --print-token flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());
    let print_token = args.iter().any(|a| a == "--print-token");

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        consumer_key = %config.consumer.key,
        callback_url = %config.authorize.callback_url,
        force_login = config.authorize.force_login,
        mode = ?config.session.mode,
        timeout_secs = config.http.timeout_secs,
        "configuration loaded"
    );

    let authorizer = build_authorizer(&config).await?;
    let request = config.authorize_request()?;

    // Dropping the authorize future on a signal aborts the session and
    // releases the credential store.
    let authorization = tokio::select! {
        result = authorizer.authorize(request) => match result {
            Ok(authorization) => authorization,
            Err(e) => {
                error!(error = %e, kind = e.kind().as_str(), "authorization failed");
                return Err(anyhow::Error::new(e).context("authorization failed"));
            }
        },
        _ = shutdown_signal() => {
            return Err(error::Error::Aborted.into());
        }
    };

    let summary = LoginSummary::new(&authorization, print_token);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!("fetchmee-login finished");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, aborting authorization"),
        _ = terminate => info!("received SIGTERM, aborting authorization"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth1::{AccessToken, TokenResponse};
    use transport::{HeaderMap, HttpResponse, StatusCode};

    fn authorization(body: &str) -> Authorization {
        let response = HttpResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        };
        let access_token = AccessToken::from(TokenResponse::parse_str(body).unwrap());
        Authorization {
            access_token,
            response,
        }
    }

    #[test]
    fn summary_hides_token_secret_by_default() {
        let auth = authorization(
            "oauth_token=tok2&oauth_token_secret=sec2&user_id=42&screen_name=fetchmee",
        );
        let json = serde_json::to_value(LoginSummary::new(&auth, false)).unwrap();
        assert_eq!(json["user_id"], "42");
        assert_eq!(json["screen_name"], "fetchmee");
        assert_eq!(json["oauth_token"], "tok2");
        assert!(json.get("credentials").is_none());
        assert!(!json.to_string().contains("sec2"), "secret leaked: {json}");
    }

    #[test]
    fn summary_includes_credentials_when_asked() {
        let auth = authorization("oauth_token=tok2&oauth_token_secret=sec2&user_id=42");
        let json = serde_json::to_value(LoginSummary::new(&auth, true)).unwrap();
        let credentials = json["credentials"].as_str().unwrap();
        assert!(credentials.contains("oauth_token_secret=sec2"));
        assert!(json["screen_name"].is_null());
    }

    #[tokio::test]
    async fn console_mode_builds_authorizer() {
        let mut config: Config = toml::from_str("[consumer]\nkey = \"ck\"\n").unwrap();
        config.consumer.secret = Some(common::Secret::new("cs".to_string()));

        let authorizer = build_authorizer(&config).await.unwrap();
        let credential = authorizer.credential().await;
        assert_eq!(credential.consumer().key, "ck");
        assert!(!credential.is_authenticated());
    }

    #[tokio::test]
    async fn unresolved_secret_is_an_error() {
        let config: Config = toml::from_str("[consumer]\nkey = \"ck\"\n").unwrap();
        assert!(build_authorizer(&config).await.is_err());
    }

    #[tokio::test]
    async fn loopback_mode_binds_listener() {
        let mut config: Config = toml::from_str(
            "[consumer]\nkey = \"ck\"\n\n[authorize]\ncallback_url = \"http://127.0.0.1:0/cb\"\n\n[session]\nmode = \"loopback\"\nlisten_addr = \"127.0.0.1:0\"\n",
        )
        .unwrap();
        config.consumer.secret = Some(common::Secret::new("cs".to_string()));
        assert!(build_session(&config).await.is_ok());
    }
}
