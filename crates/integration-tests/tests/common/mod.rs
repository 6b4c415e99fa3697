//! Shared helpers for admin router tests.

#![allow(dead_code)]

use axum::http::StatusCode;
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};

use mung_integration_tests::{ADMIN_EMAIL, ADMIN_PASSWORD, FakeBackend};

/// Admin server (signup mode off) that keeps its session cookie.
pub fn server(fake: &FakeBackend) -> TestServer {
    server_with_signup(fake, false)
}

pub fn server_with_signup(fake: &FakeBackend, signup_mode: bool) -> TestServer {
    TestServer::builder()
        .save_cookies()
        .build(fake.admin_app(signup_mode))
        .expect("Failed to create test server")
}

/// Admin server with an operator already logged in.
pub async fn logged_in(fake: &FakeBackend) -> TestServer {
    let server = server(fake);
    let response = server
        .post("/auth/login")
        .form(&[("email", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/");
    server
}

/// A small PNG-typed file part.
pub fn image_part(file_name: &str) -> Part {
    Part::bytes(b"\x89PNG fake".to_vec())
        .file_name(file_name.to_string())
        .mime_type("image/png")
}

/// Multipart form from text fields.
pub fn text_form(fields: &[(&str, &str)]) -> MultipartForm {
    fields.iter().fold(MultipartForm::new(), |form, (name, value)| {
        form.add_text(name.to_string(), value.to_string())
    })
}

/// Follow a redirect and return the page body.
pub async fn follow(server: &TestServer, response: &axum_test::TestResponse) -> String {
    let location = response
        .header("location")
        .to_str()
        .expect("Location is text")
        .to_string();
    let page = server.get(&location).await;
    assert_eq!(page.status_code(), StatusCode::OK, "GET {location}");
    page.text()
}
