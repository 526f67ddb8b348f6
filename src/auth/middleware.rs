//! Session middleware
//!
//! Decodes the session cookie on every request and hands handlers a shared
//! `Session` handle. When a handler changes the session, the middleware
//! writes exactly one `Set-Cookie` on the way out.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::Utc;
use parking_lot::Mutex;

use super::session::{IdentityProfile, SessionContext};
use crate::AppState;
use crate::error::AppError;

#[derive(Debug)]
struct SessionInner {
    context: SessionContext,
    dirty: bool,
}

/// Request-scoped session handle
///
/// Cloning shares the same underlying state, so the middleware sees every
/// change a handler makes.
///
/// # Usage
/// ```ignore
/// async fn handler(session: Session) -> impl IntoResponse {
///     if session.is_authenticated() { "welcome back" } else { "hello" }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub(crate) fn new(context: SessionContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                context,
                dirty: false,
            })),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().context.is_authenticated()
    }

    pub fn identity(&self) -> Option<IdentityProfile> {
        self.inner.lock().context.identity().cloned()
    }

    pub(crate) fn pending_nonce(&self) -> Option<String> {
        self.inner.lock().context.pending_nonce().map(ToOwned::to_owned)
    }

    /// Replace the context and mark it for re-encoding
    pub(crate) fn replace(&self, context: SessionContext) {
        let mut inner = self.inner.lock();
        inner.context = context;
        inner.dirty = true;
    }

    /// Returns the context if it changed during this request, clearing the flag
    fn take_dirty(&self) -> Option<SessionContext> {
        let mut inner = self.inner.lock();
        if !inner.dirty {
            return None;
        }
        inner.dirty = false;
        Some(inner.context.clone())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("session layer is not installed"))
        })
    }
}

/// Middleware that attaches the decoded session to every request
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/secret", get(secret))
///     .layer(middleware::from_fn_with_state(state, session_layer));
/// ```
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = &state.config.session.cookie_name;
    let raw = CookieJar::from_headers(request.headers())
        .get(cookie_name)
        .map(|cookie| cookie.value().to_owned());

    let session = Session::new(state.codec.decode(raw.as_deref()));
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Some(context) = session.take_dirty() {
        match set_cookie_header(&state, &context) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(error) => return error.into_response(),
        }
    }

    response
}

fn set_cookie_header(state: &AppState, context: &SessionContext) -> Result<HeaderValue, AppError> {
    let name = state.config.session.cookie_name.clone();
    let cookie = if context.is_anonymous() {
        removal_cookie(name)
    } else {
        let now = Utc::now();
        let encoded = state.codec.encode_at(context, now)?;
        let max_age = (encoded.expires_at - now).num_seconds();
        session_cookie(name, encoded.value, max_age)
    };

    HeaderValue::from_str(&cookie.to_string()).map_err(|e| AppError::Internal(e.into()))
}

/// Session cookie carrying a signed value
///
/// `Secure` is unconditional: the service is only reachable over TLS.
/// `SameSite=Lax` lets the cookie ride along on the provider's top-level
/// redirect back to the callback.
pub(crate) fn session_cookie(name: String, value: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

/// Cookie that makes the browser drop the session
pub(crate) fn removal_cookie(name: String) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Extractor for current authenticated user
///
/// Rejects with 401 `{"error": "you must log in!"}` for anonymous requests.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(identity): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", identity.display_name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub IdentityProfile);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        session
            .identity()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
