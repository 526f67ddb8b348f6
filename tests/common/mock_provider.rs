//! In-process stand-in for Google's token and userinfo endpoints

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";

/// Google `sub` returned for the `valid` code
pub const SUBJECT: &str = "110169484474386276334";

/// Codes understood by the token endpoint:
/// - `valid`: issues a token for a complete profile
/// - `nosub`: issues a token whose profile lacks `sub`
/// - `slow`: like `valid`, after a 3 second stall
/// - anything else: `invalid_grant`
pub struct MockProvider {
    pub base_url: String,
}

impl MockProvider {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/token", post(token))
            .route("/userinfo", get(userinfo));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
        }
    }

    pub fn auth_url(&self) -> String {
        format!("{}/authorize", self.base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.base_url)
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}/userinfo", self.base_url)
    }
}

async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
    let field = |name: &str| form.get(name).map(String::as_str);

    if field("client_id") != Some(CLIENT_ID)
        || field("client_secret") != Some(CLIENT_SECRET)
        || field("grant_type") != Some("authorization_code")
        || field("redirect_uri").is_none()
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client" })),
        )
            .into_response();
    }

    let access_token = match field("code") {
        Some("valid") => "access-valid",
        Some("nosub") => "access-nosub",
        Some("slow") => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            "access-valid"
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant" })),
            )
                .into_response();
        }
    };

    Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3599,
        "scope": "openid email profile",
    }))
    .into_response()
}

async fn userinfo(headers: HeaderMap) -> Response {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match bearer {
        Some("access-valid") => Json(json!({
            "sub": SUBJECT,
            "name": "Test User",
            "email": "test.user@example.com",
            "email_verified": true,
            "picture": "https://example.com/avatar.png",
        }))
        .into_response(),
        Some("access-nosub") => Json(json!({
            "name": "Ghost",
            "email": "ghost@example.com",
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}
