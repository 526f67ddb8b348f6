//! Error types for Signon
//!
//! `AppError` covers everything that turns into an HTTP error response.
//! `AuthError` is the login-flow taxonomy: every variant is recovered by
//! sending the browser to `/failure` so the user can retry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::found;
use crate::metrics::{ERRORS_TOTAL, LOGINS_TOTAL};

/// Path users land on after a failed login
pub const FAILURE_PATH: &str = "/failure";

/// Application-wide error type
///
/// Implements `IntoResponse` so handlers can return it directly.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("you must log in!")]
    Unauthorized,

    /// Configuration error (500, fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Server-side failures are logged here and answered with a generic
    /// message; nothing internal reaches the client.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "config",
            ),
            AppError::Encryption(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "encryption",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Login-flow errors raised while completing the provider callback
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The `state` echoed by the provider does not match the issued nonce
    #[error("OAuth state mismatch")]
    StateMismatch,

    /// Code exchange or profile fetch failed (invalid code, timeout, provider down)
    #[error("Provider exchange failed: {0}")]
    ProviderExchange(String),

    /// The provider returned a profile without a stable identifier
    #[error("Provider profile has no stable identifier")]
    ProfileIncomplete,
}

impl AuthError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::StateMismatch => "state_mismatch",
            AuthError::ProviderExchange(_) => "provider_exchange",
            AuthError::ProfileIncomplete => "profile_incomplete",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, kind = self.kind(), "Login failed");
        LOGINS_TOTAL.with_label_values(&[self.kind()]).inc();
        found(FAILURE_PATH)
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
