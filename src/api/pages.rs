//! Application pages
//!
//! The landing page, the login failure page and the demo `/secret`
//! resource, which is only served to signed-in users.

use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::{AppError, FAILURE_PATH};

/// Create pages router
///
/// Routes:
/// - GET / - Landing page from `assets.index_path`
/// - GET /secret - Protected demo resource
/// - GET /failure - Shown after a failed login
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/secret", get(secret))
        .route(FAILURE_PATH, get(failure))
}

/// GET /
async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let path = &state.config.assets.index_path;
    let page = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Internal(
            anyhow::Error::new(e).context(format!("failed to read {}", path.display())),
        )
    })?;
    Ok(Html(page))
}

/// GET /secret
///
/// Anonymous callers get 401 `{"error": "you must log in!"}` from the
/// `CurrentUser` extractor.
async fn secret(CurrentUser(identity): CurrentUser) -> &'static str {
    tracing::debug!(subject = %identity.id, "Serving secret");
    "Your personal secret value is 42!"
}

/// GET /failure
async fn failure() -> &'static str {
    "Failed to log in!"
}
