//! Login, logout, session expiry and first-run setup through the admin router.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use mung_integration_tests::{ADMIN_EMAIL, ADMIN_PASSWORD, FakeBackend};

#[tokio::test]
async fn test_protected_page_redirects_to_login() {
    let fake = FakeBackend::start().await;
    let server = common::server(&fake);

    let response = server.get("/users").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/auth/login");
    assert!(fake.requests_to("GET", "/admin/users").is_empty());
}

#[tokio::test]
async fn test_health_is_public() {
    let fake = FakeBackend::start().await;
    let server = common::server(&fake);

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_follows_backend() {
    let fake = FakeBackend::start().await;
    let server = common::server(&fake);

    assert_eq!(
        server.get("/health/ready").await.status_code(),
        StatusCode::OK
    );

    fake.fail("GET", "/phishing/categories", 500, "down");
    assert_eq!(
        server.get("/health/ready").await.status_code(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_login_page_renders() {
    let fake = FakeBackend::start().await;
    let server = common::server(&fake);

    let response = server.get("/auth/login").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("Log in"));
}

#[tokio::test]
async fn test_bad_password_shows_error() {
    let fake = FakeBackend::start().await;
    let server = common::server(&fake);

    let response = server
        .post("/auth/login")
        .form(&[("email", ADMIN_EMAIL), ("password", "wrong")])
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(
        response
            .text()
            .contains("Login failed. Check your email and password.")
    );

    let page = server.get("/").await;
    assert_eq!(page.status_code(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_empty_login_form_skips_backend() {
    let fake = FakeBackend::start().await;
    let server = common::server(&fake);

    let response = server
        .post("/auth/login")
        .form(&[("email", ""), ("password", "")])
        .await;
    assert!(response.text().contains("Enter both email and password."));
    assert!(fake.requests_to("POST", "/auth/token").is_empty());
}

#[tokio::test]
async fn test_login_then_dashboard_then_logout() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let dashboard = server.get("/").await;
    assert_eq!(dashboard.status_code(), StatusCode::OK);
    let body = dashboard.text();
    assert!(body.contains("Logged in."));
    assert!(body.contains(ADMIN_EMAIL));

    let logout = server.post("/auth/logout").await;
    assert_eq!(logout.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(logout.header("location"), "/auth/login");
    assert!(common::follow(&server, &logout).await.contains("Logged out."));

    let after = server.get("/users").await;
    assert_eq!(after.status_code(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_page_redirects_when_logged_in() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server.get("/auth/login").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/");
}

#[tokio::test]
async fn test_rejected_token_expires_session() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;
    fake.fail("GET", "/admin/users", 401, "Could not validate credentials");

    let response = server.get("/users").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/auth/login?expired=1");

    let login = common::follow(&server, &response).await;
    assert!(login.contains("Your session has expired. Please log in again."));

    // The expired flow cleared the session.
    let again = server.get("/personas").await;
    assert_eq!(again.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(again.header("location"), "/auth/login");
}

#[tokio::test]
async fn test_setup_is_hidden_without_signup_mode() {
    let fake = FakeBackend::start().await;
    let server = common::server(&fake);

    let response = server.get("/auth/setup").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_setup_redirects_to_login_when_superuser_exists() {
    let fake = FakeBackend::start().await;
    let server = common::server_with_signup(&fake, true);

    let response = server.get("/auth/setup").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/auth/login");
}

#[tokio::test]
async fn test_unknown_superuser_state_keeps_setup_closed() {
    let fake = FakeBackend::start().await;
    fake.fail("GET", "/admin/superuser-exists", 500, "database down");
    let server = common::server_with_signup(&fake, true);

    let login = server.get("/auth/login").await;
    assert_eq!(login.status_code(), StatusCode::OK);

    let setup = server.get("/auth/setup").await;
    assert_eq!(setup.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(setup.header("location"), "/auth/login");
}

#[tokio::test]
async fn test_first_run_setup_creates_superuser() {
    let fake = FakeBackend::start().await;
    fake.set_superuser_exists(json!(false));
    let server = common::server_with_signup(&fake, true);

    let login = server.get("/auth/login").await;
    assert_eq!(login.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(login.header("location"), "/auth/setup");

    let page = server.get("/auth/setup").await;
    assert_eq!(page.status_code(), StatusCode::OK);

    let mismatch = server
        .post("/auth/setup")
        .form(&[
            ("email", "root@example.com"),
            ("password", "first-password"),
            ("confirm_password", "second-password"),
        ])
        .await;
    assert_eq!(mismatch.status_code(), StatusCode::OK);
    assert!(mismatch.text().contains("Passwords do not match."));

    let missing = server
        .post("/auth/setup")
        .form(&[
            ("email", ""),
            ("password", "first-password"),
            ("confirm_password", "first-password"),
        ])
        .await;
    assert!(missing.text().contains("All fields are required."));
    assert!(
        fake.requests_to("POST", "/admin/initial-superuser")
            .is_empty()
    );

    let created = server
        .post("/auth/setup")
        .form(&[
            ("email", "root@example.com"),
            ("password", "first-password"),
            ("confirm_password", "first-password"),
        ])
        .await;
    assert_eq!(created.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(created.header("location"), "/auth/login");

    let body = fake
        .last_request("POST", "/admin/initial-superuser")
        .expect("Setup request recorded")
        .json();
    assert_eq!(body["email"], "root@example.com");
    assert_eq!(body["password"], "first-password");
    assert!(
        fake.users()
            .iter()
            .any(|u| u["email"] == "root@example.com")
    );

    let login_page = common::follow(&server, &created).await;
    assert!(login_page.contains("Superuser root@example.com created. Please log in."));
}

#[tokio::test]
async fn test_refresh_clears_cache_and_returns() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    server.get("/users").await;
    server.get("/users").await;
    assert_eq!(fake.requests_to("GET", "/admin/users").len(), 1);

    let response = server
        .post("/refresh")
        .form(&[("return_to", "/users")])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/users");

    server.get("/users").await;
    assert_eq!(fake.requests_to("GET", "/admin/users").len(), 2);
}

#[tokio::test]
async fn test_refresh_rejects_offsite_return() {
    let fake = FakeBackend::start().await;
    let server = common::logged_in(&fake).await;

    let response = server
        .post("/refresh")
        .form(&[("return_to", "//evil.example.com")])
        .await;
    assert_eq!(response.header("location"), "/");
}
