#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use oxford_server::config::{Config, StorageBackend};
use oxford_server::web::{AppState, build_router};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "president@oxfordhouse.org";
pub const ADMIN_PASSWORD: &str = "one-day-at-a-time";
pub const HOUSE_ID: &str = "house-17";

pub fn test_config() -> Config {
    Config {
        port: 0,
        jwt_secret: "integration-test-secret".to_string(),
        storage: StorageBackend::Memory,
        supabase_url: None,
        supabase_anon_key: None,
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        docs_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/docs").into(),
        house_id: Some(HOUSE_ID.to_string()),
    }
}

/// The whole portal on the memory backend.
pub fn test_app() -> Router {
    let state = AppState::from_config(test_config()).expect("memory backend is configured");
    build_router(state)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

pub fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// A form submission the way htmx sends it.
pub fn form(method: &str, uri: &str, cookie: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("hx-request", "true")
        .body(Body::from(body))
        .unwrap()
}

fn encode(text: &str) -> String {
    text.bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (byte as char).to_string(),
            b' ' => "+".to_string(),
            _ => format!("%{byte:02X}"),
        })
        .collect()
}

/// Signs in as the configured account and returns the `Cookie` header value.
pub async fn sign_in(app: &Router) -> String {
    let response = send(
        app,
        form(
            "POST",
            "/login",
            "",
            &[("email", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)],
        ),
    )
    .await;
    assert_eq!(response.header("hx-redirect"), Some("/dashboard"));
    let set_cookie = response.header("set-cookie").expect("session cookie is set");
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string()
}
