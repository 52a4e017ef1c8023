//! Authentication API Tests
//!
//! Everything here is decided before the first database query.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{display_name, expired_token, unique_email, unique_username, TestApp};

#[tokio::test]
async fn test_register_with_invalid_email_fails_validation() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": "not-an-email",
            "username": unique_username(),
            "password": "ValidPassword123!"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let json: Value = response.json();
    assert_eq!(json["code"], 10007);
    assert_eq!(json["errors"][0]["field"], "email");
}

#[tokio::test]
async fn test_register_with_short_password_fails_validation() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/register")
        .json(&json!({
            "email": unique_email(),
            "username": unique_username(),
            "display_name": display_name(),
            "password": "short"
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let json: Value = response.json();
    let fields: Vec<&str> = json["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["password"]);
}

#[tokio::test]
async fn test_login_with_missing_fields_is_rejected() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": unique_email() }))
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_google_sign_in_disabled_is_unavailable() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/google")
        .json(&json!({ "id_token": "header.payload.signature" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_logout_always_succeeds() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/auth/logout")
        .json(&json!({ "refresh_token": "not-a-real-token" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = TestApp::new();

    let response = app.server.get("/api/v1/auth/me").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/auth/me")
        .authorization_bearer(expired_token(42))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = TestApp::new();
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({ "sub": "1", "role": "admin", "exp": chrono::Utc::now().timestamp() + 600, "iat": 0 }),
        &jsonwebtoken::EncodingKey::from_secret(b"some-other-secret-of-sufficient-length"),
    )
    .unwrap();

    let response = app
        .server
        .get("/admin/dashboard")
        .authorization_bearer(forged)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}
