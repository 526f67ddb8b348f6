//! TLS material for the HTTPS listener
//!
//! Both PEM files are read eagerly so a missing or unreadable file stops the
//! process before it binds a socket.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;
use crate::error::AppError;

/// Load the certificate chain and private key named in `config`
///
/// # Errors
/// Returns `AppError::Config` if either file is missing, empty or not valid PEM
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, AppError> {
    let cert = read_pem(&config.cert_path, "certificate").await?;
    let key = read_pem(&config.key_path, "private key").await?;

    let tls = RustlsConfig::from_pem(cert, key)
        .await
        .map_err(|e| AppError::Config(format!("invalid TLS material: {e}")))?;

    tracing::info!(cert = %config.cert_path.display(), "TLS material loaded");
    Ok(tls)
}

async fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>, AppError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::Config(format!("failed to read TLS {what} {}: {e}", path.display()))
    })?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Config(format!(
            "TLS {what} {} is empty",
            path.display()
        )));
    }

    Ok(bytes)
}
