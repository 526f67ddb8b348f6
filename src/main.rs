//! Signon binary entry point

use std::net::SocketAddr;

use signon::{AppState, config, error::AppError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Read `.env` and load configuration
/// 2. Initialize tracing/logging
/// 3. Validate configuration and initialize metrics
/// 4. Load TLS material
/// 5. Initialize AppState
/// 6. Build Axum router
/// 7. Start HTTPS server
///
/// Any missing configuration value or TLS file aborts before binding.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Read .env and load configuration
    let env_file = config::load_env_file(None)?;
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter_directive().into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Signon...");
    if let Some(path) = env_file {
        tracing::info!(path = %path.display(), "Environment file loaded");
    }

    // 3. Validate configuration and initialize metrics
    config.validate()?;
    tracing::info!(
        public_url = %config.server.public_url,
        signing_keys = config.session.keys.len(),
        "Configuration loaded"
    );
    signon::metrics::init_metrics();

    // 4. Load TLS material
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("TLS crypto provider already installed");
    }
    let tls = signon::tls::load_tls_config(&config.tls).await?;

    // 5. Initialize application state
    let state = AppState::new(config.clone())?;

    // 6. Build Axum router
    let app = signon::build_router(state);

    // 7. Start HTTPS server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid listen address: {e}")))?;

    tracing::info!("Listening on {}...", addr);
    tracing::info!("Public URL: {}", config.server.public_url);

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
