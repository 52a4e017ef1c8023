//! Security Headers Middleware
//!
//! Adds security headers to every response. The API serves JSON and
//! uploaded images only, so the content policy denies everything else.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request, Response},
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};

/// Security headers configuration
#[derive(Clone, Debug)]
pub struct SecurityHeadersConfig {
    /// Send HSTS (only behind HTTPS)
    pub enable_hsts: bool,
    /// HSTS max-age in seconds
    pub hsts_max_age: u64,
    pub content_security_policy: String,
    pub referrer_policy: String,
    pub permissions_policy: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enable_hsts: true,
            hsts_max_age: 31_536_000,
            content_security_policy: "default-src 'none'; img-src 'self'; frame-ancestors 'none'"
                .to_string(),
            referrer_policy: "no-referrer".to_string(),
            permissions_policy: "geolocation=(), microphone=(), camera=()".to_string(),
        }
    }
}

impl SecurityHeadersConfig {
    /// HSTS is only sent in production.
    pub fn for_environment(environment: &str) -> Self {
        Self {
            enable_hsts: environment.eq_ignore_ascii_case("production"),
            ..Default::default()
        }
    }

    fn hsts_value(&self) -> Option<HeaderValue> {
        self.enable_hsts
            .then(|| format!("max-age={}; includeSubDomains", self.hsts_max_age))
            .and_then(|v| HeaderValue::from_str(&v).ok())
    }
}

/// Layer that adds security headers to responses
#[derive(Clone, Default)]
pub struct SecurityHeadersLayer {
    config: SecurityHeadersConfig,
}

impl SecurityHeadersLayer {
    pub fn with_config(config: SecurityHeadersConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    config: SecurityHeadersConfig,
}

impl<S> Service<Request<Body>> for SecurityHeadersMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            let headers = response.headers_mut();

            headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

            if let Some(value) = config.hsts_value() {
                headers.insert(header::STRICT_TRANSPORT_SECURITY, value);
            }
            if let Ok(value) = HeaderValue::from_str(&config.content_security_policy) {
                headers.insert(header::CONTENT_SECURITY_POLICY, value);
            }
            if let Ok(value) = HeaderValue::from_str(&config.referrer_policy) {
                headers.insert(header::REFERRER_POLICY, value);
            }
            if let Ok(value) = HeaderValue::from_str(&config.permissions_policy) {
                headers.insert(HeaderName::from_static("permissions-policy"), value);
            }

            // Authenticated JSON must never land in a shared cache
            if !headers.contains_key(header::CACHE_CONTROL) {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            }

            Ok(response)
        })
    }
}

/// Security headers for the given environment.
pub fn create_security_headers_layer(environment: &str) -> SecurityHeadersLayer {
    SecurityHeadersLayer::with_config(SecurityHeadersConfig::for_environment(environment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "OK"
    }

    async fn cached_handler() -> ([(header::HeaderName, &'static str); 1], &'static str) {
        ([(header::CACHE_CONTROL, "public, max-age=60")], "OK")
    }

    async fn call(app: Router) -> Response<Body> {
        app.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_production_headers() {
        let app = Router::new()
            .route("/", get(ok_handler))
            .layer(create_security_headers_layer("production"));

        let response = call(app).await;
        let headers = response.headers();

        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert!(headers[header::STRICT_TRANSPORT_SECURITY]
            .to_str()
            .unwrap()
            .starts_with("max-age=31536000"));
        assert!(headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .contains("frame-ancestors 'none'"));
    }

    #[tokio::test]
    async fn test_no_hsts_outside_production() {
        let app = Router::new()
            .route("/", get(ok_handler))
            .layer(create_security_headers_layer("development"));

        let response = call(app).await;
        assert!(response
            .headers()
            .get(header::STRICT_TRANSPORT_SECURITY)
            .is_none());
    }

    #[tokio::test]
    async fn test_existing_cache_control_kept() {
        let app = Router::new()
            .route("/", get(cached_handler))
            .layer(SecurityHeadersLayer::default());

        let response = call(app).await;
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=60"
        );
    }
}
