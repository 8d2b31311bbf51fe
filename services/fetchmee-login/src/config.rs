//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The consumer secret is loaded from FETCHMEE_CONSUMER_SECRET or
//! secret_file, never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use twitter_auth::AuthorizeRequest;
use url::{Host, Url};

const SECRET_ENV: &str = "FETCHMEE_CONSUMER_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub authorize: AuthorizeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Twitter application identity
#[derive(Debug, Deserialize)]
pub struct ConsumerConfig {
    pub key: String,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
    /// Path to a file containing the consumer secret (alternative to the env var)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
}

/// Handshake options
#[derive(Debug, Deserialize)]
pub struct AuthorizeConfig {
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    #[serde(default)]
    pub force_login: bool,
    #[serde(default)]
    pub ephemeral_session: bool,
}

impl Default for AuthorizeConfig {
    fn default() -> Self {
        Self {
            callback_url: default_callback_url(),
            force_login: false,
            ephemeral_session: false,
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

/// How the authorization page reaches the user and the callback comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Print the URL, read the redirected callback URL from stdin
    #[default]
    Console,
    /// Catch the redirect on a local HTTP listener
    Loopback,
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub mode: SessionMode,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_callback_url() -> String {
    "fetchmee://success".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8765))
}

/// Whether a browser redirected to `callback` lands on a listener bound to `addr`.
fn callback_reaches(callback: &Url, addr: SocketAddr) -> bool {
    if callback.port_or_known_default() != Some(addr.port()) {
        return false;
    }
    match callback.host() {
        Some(Host::Ipv4(ip)) => addr.ip().is_unspecified() || IpAddr::V4(ip) == addr.ip(),
        Some(Host::Ipv6(ip)) => addr.ip().is_unspecified() || IpAddr::V6(ip) == addr.ip(),
        Some(Host::Domain(name)) => {
            name.eq_ignore_ascii_case("localhost")
                && (addr.ip().is_loopback() || addr.ip().is_unspecified())
        }
        None => false,
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Consumer secret resolution order:
    /// 1. FETCHMEE_CONSUMER_SECRET env var
    /// 2. secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.consumer.key.trim().is_empty() {
            return Err(common::Error::Config("consumer.key must not be empty".into()));
        }

        if config.http.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        let callback = config.callback_url()?;
        if config.session.mode == SessionMode::Loopback && callback.scheme() != "http" {
            return Err(common::Error::Config(format!(
                "loopback session needs an http:// callback_url, got: {}",
                config.authorize.callback_url
            )));
        }
        if config.session.mode == SessionMode::Loopback
            && !callback_reaches(&callback, config.session.listen_addr)
        {
            return Err(common::Error::Config(format!(
                "loopback callback_url {} does not point at listen_addr {}",
                config.authorize.callback_url, config.session.listen_addr
            )));
        }

        // Resolve secret: env var takes precedence over file
        if let Ok(secret) = std::env::var(SECRET_ENV) {
            config.consumer.secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.consumer.secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.consumer.secret = Some(Secret::new(secret));
            }
        }

        if config.consumer.secret.is_none() {
            return Err(common::Error::Config(format!(
                "consumer secret missing: set {SECRET_ENV} or consumer.secret_file"
            )));
        }

        Ok(config)
    }

    /// Parsed callback URL.
    pub fn callback_url(&self) -> common::Result<Url> {
        Url::parse(&self.authorize.callback_url).map_err(|e| {
            common::Error::Config(format!(
                "callback_url {:?} is not an absolute URL: {e}",
                self.authorize.callback_url
            ))
        })
    }

    /// Handshake parameters for `Authorizer::authorize`.
    pub fn authorize_request(&self) -> common::Result<AuthorizeRequest> {
        Ok(AuthorizeRequest {
            callback_url: self.callback_url()?,
            force_login: self.authorize.force_login,
            ephemeral_session: self.authorize.ephemeral_session,
        })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("fetchmee.toml")
    }
}
