//! E2E tests for pages, health check and basic server functionality

mod common;

use common::{INDEX_HTML, TestServer};

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server.get("/health", None).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_index_serves_landing_page() {
    let server = TestServer::new().await;

    let response = server.get("/", None).await;

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    assert_eq!(response.text().await.unwrap(), INDEX_HTML);
}

#[tokio::test]
async fn test_failure_page() {
    let server = TestServer::new().await;

    let response = server.get("/failure", None).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Failed to log in!");
}

#[tokio::test]
async fn test_secret_requires_login() {
    let server = TestServer::new().await;

    let response = server.get("/secret", None).await;

    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "error": "you must log in!" }));
}

#[tokio::test]
async fn test_garbage_cookie_is_treated_as_anonymous() {
    let server = TestServer::new().await;

    let response = server.get("/secret", Some("session=%%%not-a-cookie")).await;

    assert_eq!(response.status(), 401);
    assert!(response.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let server = TestServer::new().await;

    let response = server.get("/unknown/route", None).await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_security_headers() {
    let server = TestServer::new().await;

    let response = server.get("/", None).await;
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert!(headers.contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_metrics_exposed_after_login_attempt() {
    let server = TestServer::new().await;
    let _ = server
        .get("/auth/google/callback?code=valid&state=guessed", None)
        .await;

    let response = server.get("/metrics", None).await;

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("signon_logins_total"));
}
