//! Google OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with Google.
//!
//! The login state machine lives entirely in the session cookie:
//! `Anonymous` → `LoginPending { nonce }` → `Authenticated { identity }`.
//! Nothing is kept in server memory between the redirect and the callback,
//! so requests can land on any instance.

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
    routing::get,
};
use base64::Engine as _;
use rand::RngCore;

use super::middleware::Session;
use super::provider::CallbackParams;
use super::session::SessionContext;
use crate::AppState;
use crate::error::AuthError;
use crate::metrics::{LOGINS_TOTAL, LOGOUTS_TOTAL};

pub const LOGIN_PATH: &str = "/auth/google";
pub const CALLBACK_PATH: &str = "/auth/google/callback";
pub const LOGOUT_PATH: &str = "/auth/logout";

/// Where a signed-in (or signed-out) browser is sent
const HOME_PATH: &str = "/";

/// Create authentication router
///
/// Routes:
/// - GET /auth/google - Redirect to Google
/// - GET /auth/google/callback - OAuth callback
/// - GET /auth/logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, get(google_redirect))
        .route(CALLBACK_PATH, get(google_callback))
        .route(LOGOUT_PATH, get(logout))
}

/// 302 Found redirect
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

// =============================================================================
// Google OAuth
// =============================================================================

/// GET /auth/google
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in the session cookie
/// 3. Redirect to Google with client_id, redirect_uri, scope, state
async fn google_redirect(State(state): State<AppState>, session: Session) -> Response {
    let nonce = generate_csrf_state();
    let url = state.provider.authorization_url(&nonce);

    if session.is_authenticated() {
        tracing::info!("Signed-in user restarted login; previous identity dropped");
    }
    session.replace(SessionContext::login_pending(nonce));

    tracing::debug!("Redirecting to identity provider");
    found(url.as_str())
}

/// GET /auth/google/callback
///
/// # Steps
/// 1. Verify CSRF state against the pending nonce
/// 2. Exchange code for access token
/// 3. Fetch user info from Google
/// 4. Mark the session authenticated
/// 5. Redirect to home
///
/// Any failure clears a pending login, so a nonce is good for one attempt.
/// An unparseable query string counts as a failed exchange.
async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let expected = session.pending_nonce();

    let verified = match query {
        Ok(Query(params)) => {
            state
                .provider
                .verify_callback(&params, expected.as_deref())
                .await
        }
        Err(rejection) => Err(AuthError::ProviderExchange(format!(
            "malformed callback query: {rejection}"
        ))),
    };

    match verified {
        Ok(identity) => {
            tracing::info!(subject = %identity.id, "Login successful");
            LOGINS_TOTAL.with_label_values(&["success"]).inc();
            session.replace(SessionContext::authenticated(identity));
            found(HOME_PATH)
        }
        Err(error) => {
            if expected.is_some() {
                session.replace(SessionContext::anonymous());
            }
            error.into_response()
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// GET /auth/logout
///
/// Clears the session cookie and redirects home. The grant at the provider
/// is left alone.
async fn logout(session: Session) -> Response {
    if let Some(identity) = session.identity() {
        tracing::info!(subject = %identity.id, "Logout");
        LOGOUTS_TOTAL.inc();
    }
    session.replace(SessionContext::anonymous());
    found(HOME_PATH)
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
