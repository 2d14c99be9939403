use axum::body::Body;
use axum::http::{Request, StatusCode};

mod common;

use common::{ADMIN_EMAIL, form, get, send, sign_in, test_app};

#[tokio::test]
async fn protected_pages_redirect_to_login() {
    let app = test_app();

    let response = send(&app, get("/members", "")).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), Some("/login"));
}

#[tokio::test]
async fn htmx_requests_are_redirected_with_a_header() {
    let app = test_app();
    let request = Request::builder()
        .uri("/president/table")
        .header("hx-request", "true")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("hx-redirect"), Some("/login"));
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app();

    let response = send(&app, get("/health", "")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "OK");
}

#[tokio::test]
async fn wrong_password_shows_the_provider_message() {
    let app = test_app();

    let response = send(
        &app,
        form(
            "POST",
            "/login",
            "",
            &[("email", ADMIN_EMAIL), ("password", "wrong")],
        ),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("hx-retarget"), Some("#login-message"));
    assert!(response.body.contains("Invalid login credentials"));
    assert!(response.header("set-cookie").is_none());
}

#[tokio::test]
async fn signed_in_user_reaches_the_dashboard() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let response = send(&app, get("/dashboard", &cookie)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains(ADMIN_EMAIL));
    assert_eq!(response.header("cache-control"), Some("no-store"));
}

#[tokio::test]
async fn login_page_sends_signed_in_users_to_the_dashboard() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let response = send(&app, get("/login", &cookie)).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), Some("/dashboard"));
}

#[tokio::test]
async fn sign_out_ends_the_session() {
    let app = test_app();
    let cookie = sign_in(&app).await;

    let response = send(&app, form("POST", "/logout", &cookie, &[])).await;
    assert_eq!(response.header("hx-redirect"), Some("/login"));

    // The old cookie no longer resolves to a session.
    let response = send(&app, get("/dashboard", &cookie)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), Some("/login"));
}
