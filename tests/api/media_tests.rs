//! Media upload tests. Rejections happen before anything is stored.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use pretty_assertions::assert_eq;
use serde_json::Value;

use omsim_social::domain::UserRole;

use crate::common::{access_token, TestApp};

#[tokio::test]
async fn test_upload_requires_file_field() {
    let app = TestApp::new();
    let form = MultipartForm::new().add_text("caption", "no file here");

    let response = app
        .server
        .post("/api/v1/media")
        .authorization_bearer(access_token(7, UserRole::User))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "file");
}

#[tokio::test]
async fn test_upload_rejects_non_images() {
    let app = TestApp::new();
    let part = Part::bytes(b"plain text".to_vec())
        .file_name("notes.txt")
        .mime_type("text/plain");
    let form = MultipartForm::new().add_part("file", part);

    let response = app
        .server
        .post("/api/v1/media")
        .authorization_bearer(access_token(7, UserRole::User))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_upload_rejects_disguised_file() {
    let app = TestApp::new();
    let part = Part::bytes(b"<svg onload=alert(1)>".to_vec())
        .file_name("cat.png")
        .mime_type("image/png");
    let form = MultipartForm::new().add_part("file", part);

    let response = app
        .server
        .post("/api/v1/media")
        .authorization_bearer(access_token(7, UserRole::User))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "file");
}

#[tokio::test]
async fn test_upload_requires_token() {
    let app = TestApp::new();
    let form = MultipartForm::new().add_text("caption", "anonymous");

    let response = app.server.post("/api/v1/media").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}
