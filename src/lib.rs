//! Signon - Google sign-in with stateless signed-cookie sessions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Auth flow: /auth/google, callback, logout                │
//! │  - Pages: /, /secret, /failure                              │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Session Layer (middleware)                 │
//! │  - Decode cookie → Session handle per request               │
//! │  - Re-encode on change → one Set-Cookie                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Core                                  │
//! │  - SessionCodec (HMAC-SHA256, key rotation, 24h expiry)     │
//! │  - ProviderClient (code exchange, userinfo)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Page and metrics handlers
//! - `auth`: OAuth flow, session codec, middleware
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments
//! - `tls`: TLS material loading

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod tls;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Everything in here is immutable after startup; requests share it
/// without locking.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Session cookie codec holding the signing keys
    pub codec: Arc<auth::SessionCodec>,

    /// Identity provider client
    pub provider: Arc<auth::ProviderClient>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the key set or the provider client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let keys = auth::SigningKeySet::new(&config.session.keys)?;
        tracing::info!(
            keys = config.session.keys.len(),
            "Cookie signing keys loaded"
        );

        let codec = auth::SessionCodec::new(
            Arc::new(keys),
            chrono::Duration::seconds(config.session.max_age_seconds),
        );
        let provider = auth::ProviderClient::from_config(&config)?;

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            codec: Arc::new(codec),
            provider: Arc::new(provider),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::http::{HeaderValue, header};
    use axum::{Router, middleware};
    use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::pages_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_layer,
        ))
        .with_state(state)
        .merge(api::metrics_router())
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ))
}

async fn health_check() -> &'static str {
    "OK"
}
