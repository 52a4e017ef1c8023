//! Cache Module
//!
//! Redis connection management and key naming.
//!
//! Redis is optional for Omsim Social. It backs the sliding-window rate
//! limiter only; every other piece of state lives in PostgreSQL. When Redis
//! is disabled or unreachable at startup the server runs without it and the
//! limiter lets requests through.

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument, warn};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Returns
/// * `Ok(ConnectionManager)` - On successful connection
/// * `Err(redis::RedisError)` - If connection fails
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Connects to Redis when it is enabled, logging and returning `None` on
/// failure so the server can start without it.
pub async fn connect_optional(settings: &RedisSettings) -> Option<ConnectionManager> {
    if !settings.enabled {
        info!("Redis disabled, rate limiting will be skipped");
        return None;
    }

    match create_redis_client(settings).await {
        Ok(manager) => Some(manager),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, continuing without rate limiting");
            None
        }
    }
}

/// Cache key prefixes.
///
/// ```rust,ignore
/// use omsim_social::infrastructure::cache::keys;
///
/// let key = keys::rate_limit("auth", "ip:10.0.0.1");
/// ```
pub mod keys {
    /// Prefix for rate limiting windows (e.g., "ratelimit:auth:user:42")
    pub const RATE_LIMIT: &str = "ratelimit:";

    /// Generates a rate limit key for a request class and caller identifier
    #[inline]
    pub fn rate_limit(class: &str, identifier: impl std::fmt::Display) -> String {
        format!("{}{}:{}", RATE_LIMIT, class, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(keys::rate_limit("api", "user:42"), "ratelimit:api:user:42");
    }

    #[tokio::test]
    async fn test_disabled_redis_yields_none() {
        let settings = RedisSettings {
            url: "redis://127.0.0.1:1".to_string(),
            enabled: false,
        };
        assert!(connect_optional(&settings).await.is_none());
    }
}
