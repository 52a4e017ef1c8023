//! Health Check API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_liveness_needs_no_dependencies() {
    let app = TestApp::new();

    let response = app.server.get("/health/live").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = TestApp::new();

    let response = app.server.get("/health/ready").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["checks"]["database"]["status"], "unhealthy");
    assert_eq!(json["checks"]["redis"]["status"], "disabled");
}

#[tokio::test]
async fn test_metrics_exposes_request_counter_by_route() {
    let app = TestApp::new();
    app.server.get("/health/live").await;

    let response = app.server.get("/metrics").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let text = response.text();
    assert!(text.contains("omsim_social_http_requests_total"));
    assert!(text.contains("path=\"/health/live\""));
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::new();

    let response = app.server.get("/health").await;

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["cache-control"], "no-store");
    // HSTS is production-only
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();

    let response = app.server.get("/api/v1/nope").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
