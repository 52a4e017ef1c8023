//! Custom Extractors
//!
//! Axum extractors for the authenticated caller and request metadata.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts},
};

use crate::application::services::ClientInfo;
use crate::presentation::middleware::{client_ip_from_headers, AuthUser};
use crate::shared::error::AppError;

/// Reads the caller placed in extensions by `auth_middleware`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))
    }
}

/// User agent and client address stored on refresh sessions and passed to
/// Turnstile.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta(pub ClientInfo);

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(512).collect());

        let ip_address = client_ip_from_headers(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ci| ci.0.ip())
            })
            .map(|ip| ip.to_string());

        Ok(ClientMeta(ClientInfo {
            user_agent,
            ip_address,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_client_meta_reads_headers() {
        let (mut parts, _) = Request::builder()
            .header(USER_AGENT, "omsim-ios/2.1")
            .header("x-real-ip", "198.51.100.4")
            .body(())
            .unwrap()
            .into_parts();

        let ClientMeta(info) = ClientMeta::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.user_agent.as_deref(), Some("omsim-ios/2.1"));
        assert_eq!(info.ip_address.as_deref(), Some("198.51.100.4"));
    }

    #[tokio::test]
    async fn test_missing_auth_user_is_unauthorized() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
