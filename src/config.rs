//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (SIGNON__*)
//! 4. The flat deployment variables `CLIENT_ID`, `CLIENT_SECRET`,
//!    `COOKIE_KEY_1` and `COOKIE_KEY_2`, which always win
//!
//! A `.env` file in the working directory is read into the environment
//! first (see [`load_env_file`]); variables already set are not overridden.

use serde::Deserialize;
use std::{
    net::IpAddr,
    path::{Path, PathBuf},
};
use url::Url;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tls: TlsConfig,
    pub provider: ProviderConfig,
    pub session: SessionConfig,
    pub assets: AssetsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Externally visible origin, used to build the OAuth callback URL
    pub public_url: String,
}

/// TLS material served by the HTTPS listener
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

/// Identity provider (Google by default) client registration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
    /// Upper bound for each provider request
    pub timeout_seconds: u64,
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie name (default: "session")
    pub cookie_name: String,
    /// Cookie lifetime in seconds (default: 86400 = 24h)
    pub max_age_seconds: i64,
    /// Signing keys, newest first. The first one signs, all of them verify.
    pub keys: Vec<String>,
}

/// Static assets
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Landing page served at `/`
    pub index_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("signon={},tower_http=debug", self.level)
    }
}

/// Read a `.env` file into the process environment
///
/// With no `path`, looks for `.env` in the working directory and its
/// parents. Returns the file that was read, or `None` if there is none.
///
/// # Errors
/// Returns `AppError::Config` if the file exists but cannot be parsed
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, AppError> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(AppError::Config(format!(
            "failed to read .env file: {error}"
        ))),
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// The result is not validated yet; call [`AppConfig::validate`] once
    /// logging is up so its warnings are not lost.
    ///
    /// # Errors
    /// Returns `AppError::Config` if a source cannot be read or deserialized
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let cookie_keys = match (
            std::env::var("COOKIE_KEY_1").ok(),
            std::env::var("COOKIE_KEY_2").ok(),
        ) {
            (Some(primary), secondary) => Some(
                std::iter::once(primary)
                    .chain(secondary)
                    .collect::<Vec<String>>(),
            ),
            (None, Some(_)) => {
                return Err(AppError::Config(
                    "COOKIE_KEY_2 is set but COOKIE_KEY_1 is not".to_string(),
                ));
            }
            (None, None) => None,
        };

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "https://localhost:3000")?
            .set_default("tls.cert_path", "cert.pem")?
            .set_default("tls.key_path", "key.pem")?
            .set_default("provider.client_id", "")?
            .set_default("provider.client_secret", "")?
            .set_default(
                "provider.auth_url",
                "https://accounts.google.com/o/oauth2/v2/auth",
            )?
            .set_default("provider.token_url", "https://oauth2.googleapis.com/token")?
            .set_default(
                "provider.userinfo_url",
                "https://openidconnect.googleapis.com/v1/userinfo",
            )?
            .set_default("provider.scopes", vec!["email", "profile"])?
            .set_default("provider.timeout_seconds", 10)?
            .set_default("session.cookie_name", "session")?
            .set_default("session.max_age_seconds", 86400)?
            .set_default("session.keys", Vec::<String>::new())?
            .set_default("assets.index_path", "public/index.html")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (SIGNON__*)
            .add_source(
                Environment::with_prefix("SIGNON")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("provider.client_id", std::env::var("CLIENT_ID").ok())?
            .set_override_option(
                "provider.client_secret",
                std::env::var("CLIENT_SECRET").ok(),
            )?
            .set_override_option("session.keys", cookie_keys)?
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    /// Absolute URL the provider redirects back to
    pub fn redirect_uri(&self) -> Result<Url, AppError> {
        let base = Url::parse(&self.server.public_url)
            .map_err(|e| AppError::Config(format!("server.public_url is invalid: {e}")))?;
        base.join(crate::auth::CALLBACK_PATH)
            .map_err(|e| AppError::Config(format!("server.public_url is invalid: {e}")))
    }

    /// Check required values and cross-field constraints
    ///
    /// # Errors
    /// Returns `AppError::Config` naming the first offending value
    pub fn validate(&self) -> Result<(), AppError> {
        const RECOMMENDED_KEY_BYTES: usize = 32;
        const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        if self.provider.client_id.trim().is_empty() {
            return Err(AppError::Config("CLIENT_ID must be set".to_string()));
        }

        if self.provider.client_secret.trim().is_empty() {
            return Err(AppError::Config("CLIENT_SECRET must be set".to_string()));
        }

        if self.session.keys.is_empty() {
            return Err(AppError::Config("COOKIE_KEY_1 must be set".to_string()));
        }

        if self.session.keys.iter().any(|key| key.is_empty()) {
            return Err(AppError::Config(
                "cookie signing keys must not be empty".to_string(),
            ));
        }

        if self
            .session
            .keys
            .iter()
            .any(|key| key.len() < RECOMMENDED_KEY_BYTES)
        {
            tracing::warn!(
                recommended_bytes = RECOMMENDED_KEY_BYTES,
                "Cookie signing key is shorter than recommended"
            );
        }

        if self.session.max_age_seconds <= 0 {
            return Err(AppError::Config(
                "session.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        if self.provider.timeout_seconds == 0 {
            return Err(AppError::Config(
                "provider.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("provider.auth_url", &self.provider.auth_url),
            ("provider.token_url", &self.provider.token_url),
            ("provider.userinfo_url", &self.provider.userinfo_url),
        ] {
            Url::parse(value).map_err(|e| AppError::Config(format!("{name} is invalid: {e}")))?;
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(AppError::Config(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(
                "logging.format must be \"pretty\" or \"json\"".to_string(),
            ));
        }

        let redirect_uri = self.redirect_uri()?;
        if redirect_uri.scheme() != "https" {
            let host = redirect_uri.host_str().unwrap_or_default();
            if !is_local_host(host) {
                return Err(AppError::Config(
                    "server.public_url must be https for non-local hosts".to_string(),
                ));
            }
            tracing::warn!(%host, "Using a plain-http public URL for local development");
        }

        Ok(())
    }
}

fn is_local_host(host: &str) -> bool {
    let host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

#[cfg(test)]
impl AppConfig {
    /// Complete, valid configuration for tests
    pub(crate) fn sample() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                public_url: "https://app.example.com".to_string(),
            },
            tls: TlsConfig {
                cert_path: PathBuf::from("cert.pem"),
                key_path: PathBuf::from("key.pem"),
            },
            provider: ProviderConfig {
                client_id: "google-client-id".to_string(),
                client_secret: "google-client-secret".to_string(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                scopes: vec!["email".to_string(), "profile".to_string()],
                timeout_seconds: 10,
            },
            session: SessionConfig {
                cookie_name: "session".to_string(),
                max_age_seconds: 86_400,
                keys: vec!["k".repeat(32), "j".repeat(32)],
            },
            assets: AssetsConfig {
                index_path: PathBuf::from("public/index.html"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
