//! Identity provider client
//!
//! Builds the authorization redirect and verifies the callback by exchanging
//! the one-time code at the token endpoint and reading the userinfo endpoint.
//! Requests share one `reqwest::Client` with a bounded timeout and are never
//! retried: a code can only be redeemed once.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::session::IdentityProfile;
use crate::config::AppConfig;
use crate::error::{AppError, AuthError};
use crate::metrics::PROVIDER_EXCHANGE_DURATION_SECONDS;

/// Query parameters the provider appends to the callback URL
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state token
    pub state: Option<String>,
    /// Set when the user denied consent or the provider failed
    pub error: Option<String>,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Userinfo endpoint response (OpenID Connect standard claims)
#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl UserInfo {
    fn into_profile(self) -> Result<IdentityProfile, AuthError> {
        let id = self
            .sub
            .map(|sub| sub.trim().to_string())
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthError::ProfileIncomplete)?;

        let emails: Vec<String> = self.email.into_iter().collect();
        let display_name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| emails.first().cloned())
            .unwrap_or_else(|| id.clone());

        Ok(IdentityProfile {
            id,
            display_name,
            emails,
            avatar_url: self.picture,
        })
    }
}

/// OAuth2 authorization code client for one registered application
#[derive(Clone)]
pub struct ProviderClient {
    client_id: String,
    client_secret: String,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    redirect_uri: Url,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl ProviderClient {
    /// Build a client from validated configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let provider = &config.provider;
        let parse = |name: &str, value: &str| {
            Url::parse(value).map_err(|e| AppError::Config(format!("{name} is invalid: {e}")))
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("Signon/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(provider.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.clone(),
            auth_url: parse("provider.auth_url", &provider.auth_url)?,
            token_url: parse("provider.token_url", &provider.token_url)?,
            userinfo_url: parse("provider.userinfo_url", &provider.userinfo_url)?,
            redirect_uri: config.redirect_uri()?,
            scopes: provider.scopes.clone(),
            http,
        })
    }

    /// Provider authorization URL carrying `nonce` as the `state` parameter
    pub fn authorization_url(&self, nonce: &str) -> Url {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", nonce);
        url
    }

    /// Verify a callback and return the signed-in identity
    ///
    /// The `state` check runs before any network traffic.
    ///
    /// # Errors
    /// - `StateMismatch` if no login is pending or the nonce differs
    /// - `ProviderExchange` if the provider reported an error, the code is
    ///   missing or rejected, or a request failed or timed out
    /// - `ProfileIncomplete` if the profile has no stable identifier
    pub async fn verify_callback(
        &self,
        params: &CallbackParams,
        expected_nonce: Option<&str>,
    ) -> Result<IdentityProfile, AuthError> {
        if let Some(error) = &params.error {
            return Err(AuthError::ProviderExchange(format!(
                "provider returned error: {error}"
            )));
        }

        match (params.state.as_deref(), expected_nonce) {
            (Some(received), Some(expected)) if received == expected => {}
            _ => return Err(AuthError::StateMismatch),
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::ProviderExchange("missing authorization code".to_string()))?;

        let token = self.exchange_code(code).await?;
        self.fetch_profile(&token.access_token).await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let _timer = PROVIDER_EXCHANGE_DURATION_SECONDS
            .with_label_values(&["token"])
            .start_timer();

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| exchange_error("token exchange", e))?;

        ensure_success(&response, "token exchange")?;
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| exchange_error("token exchange", e))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<IdentityProfile, AuthError> {
        let _timer = PROVIDER_EXCHANGE_DURATION_SECONDS
            .with_label_values(&["userinfo"])
            .start_timer();

        let response = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| exchange_error("userinfo request", e))?;

        ensure_success(&response, "userinfo request")?;
        response
            .json::<UserInfo>()
            .await
            .map_err(|e| exchange_error("userinfo request", e))?
            .into_profile()
    }
}

fn ensure_success(response: &reqwest::Response, operation: &str) -> Result<(), AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(AuthError::ProviderExchange(format!(
        "{operation} returned {status}"
    )))
}

fn exchange_error(operation: &str, error: reqwest::Error) -> AuthError {
    if error.is_timeout() {
        AuthError::ProviderExchange(format!("{operation} timed out"))
    } else {
        AuthError::ProviderExchange(format!("{operation} failed: {error}"))
    }
}
