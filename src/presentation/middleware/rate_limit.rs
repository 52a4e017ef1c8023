//! Rate Limiting Middleware
//!
//! Redis-based sliding window rate limiting per request class. Limits come
//! from `RateLimitSettings`. Redis is optional: without a connection, or when
//! Redis errors, requests are let through.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use serde::Serialize;

use crate::config::RateLimitSettings;
use crate::infrastructure::cache::keys;
use crate::presentation::middleware::auth::AuthUser;
use crate::shared::error::ErrorResponse;
use crate::startup::AppState;

const WINDOW_SECONDS: u64 = 60;

/// Atomically trims the window, counts, and records the request if allowed.
///
/// Returns `{allowed, count, max, retry_after_ms}`.
static SLIDING_WINDOW: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r#"
        local key = KEYS[1]
        local now_ms = tonumber(ARGV[1])
        local window_start = tonumber(ARGV[2])
        local max_requests = tonumber(ARGV[3])
        local window_seconds = tonumber(ARGV[4])

        redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)
        local current_count = redis.call('ZCARD', key)

        if current_count < max_requests then
            local member = now_ms .. ':' .. math.random(1000000)
            redis.call('ZADD', key, now_ms, member)
            redis.call('EXPIRE', key, window_seconds + 1)
            return {1, current_count + 1, max_requests, 0}
        else
            local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
            local retry_after = 0
            if oldest and #oldest >= 2 then
                retry_after = oldest[2] + (window_seconds * 1000) - now_ms
            end
            return {0, current_count, max_requests, retry_after}
        end
        "#,
    )
});

/// Request classes with independent windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateClass {
    /// Register, login, Google sign-in, refresh
    Auth,
    /// Everything else under /api/v1
    Api,
    /// Media uploads
    Upload,
    /// Signal posting and polling for calls and live rooms
    Signaling,
}

impl RateClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateClass::Auth => "auth",
            RateClass::Api => "api",
            RateClass::Upload => "upload",
            RateClass::Signaling => "signaling",
        }
    }

    /// Requests allowed per window for this class.
    pub fn limit(&self, settings: &RateLimitSettings) -> u32 {
        match self {
            RateClass::Auth => settings.auth_per_minute,
            RateClass::Api => settings.api_per_minute,
            RateClass::Upload => settings.upload_per_minute,
            RateClass::Signaling => settings.signaling_per_minute,
        }
    }
}

/// Rate limit status returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed in the current window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Unix timestamp when the window resets
    pub reset_at: i64,
    /// Seconds until a new request is accepted
    pub retry_after: u64,
}

#[derive(Debug, Serialize)]
struct RateLimitExceededResponse {
    #[serde(flatten)]
    error: ErrorResponse,
    rate_limit: RateLimitInfo,
}

/// Sliding window limiter for one request class.
///
/// Each identifier owns a sorted set whose members are request timestamps.
#[derive(Clone)]
pub struct RateLimiter {
    redis: ConnectionManager,
    class: RateClass,
    limit: u32,
}

impl RateLimiter {
    pub fn new(redis: ConnectionManager, class: RateClass, limit: u32) -> Self {
        Self {
            redis,
            class,
            limit: limit.max(1),
        }
    }

    /// `Ok` when the request is allowed, `Err` with retry information when not.
    /// A Redis failure allows the request.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitInfo, RateLimitInfo> {
        let key = keys::rate_limit(self.class.as_str(), identifier);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_start = now_ms - (WINDOW_SECONDS * 1000) as i64;
        let reset_at = now_ms / 1000 + WINDOW_SECONDS as i64;

        let mut conn = self.redis.clone();
        let result: Vec<i64> = match SLIDING_WINDOW
            .key(&key)
            .arg(now_ms)
            .arg(window_start)
            .arg(self.limit as i64)
            .arg(WINDOW_SECONDS as i64)
            .invoke_async(&mut conn)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, class = self.class.as_str(), "Rate limiter unavailable, allowing request");
                return Ok(RateLimitInfo {
                    limit: self.limit,
                    remaining: self.limit,
                    reset_at,
                    retry_after: 0,
                });
            }
        };

        let (allowed, info) = window_outcome(&result, self.limit, reset_at);
        if allowed {
            Ok(info)
        } else {
            Err(info)
        }
    }
}

/// Interpret the script reply.
fn window_outcome(result: &[i64], limit: u32, reset_at: i64) -> (bool, RateLimitInfo) {
    let allowed = result.first().copied().unwrap_or(1) == 1;
    let count = result.get(1).copied().unwrap_or(0).max(0) as u32;
    let retry_ms = result.get(3).copied().unwrap_or(0).max(0);

    let info = RateLimitInfo {
        limit,
        remaining: limit.saturating_sub(count),
        reset_at,
        retry_after: if allowed {
            0
        } else {
            ((retry_ms as f64) / 1000.0).ceil() as u64
        },
    };
    (allowed, info)
}

/// Identifier for a request: the authenticated user, else the client IP.
///
/// Forwarding headers are honoured; deploy behind a proxy that sets them.
fn extract_identifier(request: &Request, client_ip: Option<IpAddr>) -> String {
    if let Some(auth_user) = request.extensions().get::<AuthUser>() {
        return format!("user:{}", auth_user.user_id);
    }

    match client_ip_from_headers(request.headers()).or(client_ip) {
        Some(ip) => format!("ip:{}", ip),
        None => {
            tracing::warn!("Could not determine client identifier for rate limiting");
            "ip:unknown".to_string()
        }
    }
}

/// First address in `X-Forwarded-For`, else `X-Real-IP`.
pub fn client_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    })
}

pub async fn rate_limit_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, RateClass::Auth).await
}

pub async fn rate_limit_api(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, RateClass::Api).await
}

pub async fn rate_limit_upload(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, RateClass::Upload).await
}

pub async fn rate_limit_signaling(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, RateClass::Signaling).await
}

async fn rate_limit_inner(
    state: AppState,
    request: Request,
    next: Next,
    class: RateClass,
) -> Response {
    let Some(redis) = state.redis.clone() else {
        return next.run(request).await;
    };

    let peer_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());
    let identifier = extract_identifier(&request, peer_ip);
    let limiter = RateLimiter::new(redis, class, class.limit(&state.settings.rate_limit));

    match limiter.check(&identifier).await {
        Ok(info) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(info) => {
            tracing::warn!(
                identifier = %identifier,
                class = class.as_str(),
                "Rate limit exceeded"
            );
            create_rate_limit_response(info)
        }
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset_at));
}

fn create_rate_limit_response(info: RateLimitInfo) -> Response {
    let retry_after = info.retry_after;
    let headers_info = info.clone();
    let body = RateLimitExceededResponse {
        error: ErrorResponse {
            code: 10006,
            message: "You are being rate limited. Please slow down.".to_string(),
            errors: None,
        },
        rate_limit: info,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    add_rate_limit_headers(response.headers_mut(), &headers_info);
    response
}
