//! Common test utilities for E2E tests

#![allow(dead_code)]

pub mod mock_provider;

use mock_provider::{CLIENT_ID, CLIENT_SECRET, MockProvider};
use signon::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const COOKIE_KEY_1: &str = "test-cookie-key-one-32-bytes-long!!";
pub const COOKIE_KEY_2: &str = "test-cookie-key-two-32-bytes-long!!";
pub const INDEX_HTML: &str = "<!DOCTYPE html><h1>Signon test page</h1>";

/// Test server instance backed by a mock identity provider
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: MockProvider,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_provider_timeout(5).await
    }

    /// Create a test server whose provider requests give up after `seconds`
    pub async fn with_provider_timeout(seconds: u64) -> Self {
        signon::metrics::init_metrics();

        let provider = MockProvider::start().await;

        // Landing page lives in a temporary directory
        let temp_dir = TempDir::new().unwrap();
        let index_path = temp_dir.path().join("index.html");
        std::fs::write(&index_path, INDEX_HTML).unwrap();

        // Bind first so the public URL carries the real port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: addr.port(),
                public_url: addr_str.clone(),
            },
            tls: config::TlsConfig {
                cert_path: temp_dir.path().join("cert.pem"),
                key_path: temp_dir.path().join("key.pem"),
            },
            provider: config::ProviderConfig {
                client_id: CLIENT_ID.to_string(),
                client_secret: CLIENT_SECRET.to_string(),
                auth_url: provider.auth_url(),
                token_url: provider.token_url(),
                userinfo_url: provider.userinfo_url(),
                scopes: vec!["email".to_string(), "profile".to_string()],
                timeout_seconds: seconds,
            },
            session: config::SessionConfig {
                cookie_name: "session".to_string(),
                max_age_seconds: 86_400,
                keys: vec![COOKIE_KEY_1.to_string(), COOKIE_KEY_2.to_string()],
            },
            assets: config::AssetsConfig { index_path },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let app = signon::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `path`, optionally presenting a `name=value` cookie pair
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.expect("request succeeds")
    }

    /// Start a login; returns the pending cookie pair and the issued nonce
    pub async fn begin_login(&self) -> (String, String) {
        let response = self.get("/auth/google", None).await;
        assert_eq!(response.status(), 302);

        let nonce = state_param(&location(&response));
        let cookie = session_cookie(&response).expect("pending session cookie");
        (cookie.pair, nonce)
    }

    /// Run the whole login flow; returns the authenticated cookie pair
    pub async fn login(&self) -> String {
        let (pending, nonce) = self.begin_login().await;

        let response = self
            .get(
                &format!("/auth/google/callback?code=valid&state={nonce}"),
                Some(&pending),
            )
            .await;
        assert_eq!(response.status(), 302);
        assert_eq!(location(&response), "/");

        session_cookie(&response)
            .expect("authenticated session cookie")
            .pair
    }
}

/// A parsed `Set-Cookie` for the session cookie
#[derive(Debug)]
pub struct SetCookie {
    /// `session=<value>`, ready to send back in a `Cookie` header
    pub pair: String,
    pub header: String,
}

impl SetCookie {
    pub fn value(&self) -> &str {
        self.pair.split_once('=').map(|(_, v)| v).unwrap_or_default()
    }

    pub fn is_removal(&self) -> bool {
        self.value().is_empty() || self.header.contains("Max-Age=0")
    }
}

/// All session `Set-Cookie` headers on a response
pub fn session_cookies(response: &reqwest::Response) -> Vec<SetCookie> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with("session="))
        .map(|header| SetCookie {
            pair: header.split(';').next().unwrap_or_default().trim().to_string(),
            header: header.to_string(),
        })
        .collect()
}

/// The single session `Set-Cookie`, if any
pub fn session_cookie(response: &reqwest::Response) -> Option<SetCookie> {
    let mut cookies = session_cookies(response);
    assert!(cookies.len() <= 1, "expected at most one session cookie, got {cookies:?}");
    cookies.pop()
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// `state` query parameter of a provider redirect
pub fn state_param(location: &str) -> String {
    url::Url::parse(location)
        .expect("absolute provider URL")
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state parameter")
}
