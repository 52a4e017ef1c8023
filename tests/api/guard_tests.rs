//! Route guard tests: authentication, admin checks and input parsing that
//! run ahead of any service call.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

use omsim_social::domain::UserRole;

use crate::common::{access_token, TestApp};

#[test_case("/api/v1/users/me" ; "profile")]
#[test_case("/api/v1/memories/feed" ; "home feed")]
#[test_case("/api/v1/friends" ; "friends")]
#[test_case("/api/v1/conversations" ; "conversations")]
#[test_case("/api/v1/notifications" ; "inbox")]
#[test_case("/api/v1/calls/1/signals" ; "call signals")]
#[tokio::test]
async fn test_protected_routes_require_token(path: &str) {
    let app = TestApp::new();

    let response = app.server.get(path).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_rejected() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header("authorization", "Basic dXNlcjpwYXNz")
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[test_case("/admin/dashboard", UserRole::User ; "dashboard as user")]
#[test_case("/admin/reports", UserRole::User ; "reports as user")]
#[test_case("/admin/audit-log", UserRole::User ; "audit log as user")]
#[test_case("/admin/dashboard", UserRole::Moderator ; "dashboard as moderator")]
#[test_case("/admin/users", UserRole::Moderator ; "user search as moderator")]
#[tokio::test]
async fn test_admin_routes_forbid_non_admins(path: &str, role: UserRole) {
    let app = TestApp::new();

    let response = app
        .server
        .get(path)
        .authorization_bearer(access_token(7, role))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = TestApp::new();

    let response = app.server.get("/admin/dashboard").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_path_id_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/memories/not-a-number")
        .authorization_bearer(access_token(7, UserRole::User))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Invalid memory ID");
}

#[tokio::test]
async fn test_malformed_cursor_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/memories/feed?before=abc")
        .authorization_bearer(access_token(7, UserRole::User))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_memory_with_unknown_scope_is_rejected() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/v1/memories")
        .authorization_bearer(access_token(7, UserRole::User))
        .json(&json!({ "scope": "everyone", "body": "hi" }))
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_bulk_suspend_over_limit_fails_validation() {
    let app = TestApp::new();
    let ids: Vec<String> = (1..=101).map(|id| id.to_string()).collect();

    let response = app
        .server
        .post("/admin/users/bulk-suspend")
        .authorization_bearer(access_token(1, UserRole::Admin))
        .json(&json!({ "user_ids": ids }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "user_ids");
}

#[tokio::test]
async fn test_no_rate_limit_headers_without_redis() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/v1/users/abc")
        .authorization_bearer(access_token(7, UserRole::User))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("x-ratelimit-limit").is_none());
}
