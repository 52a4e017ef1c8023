//! Health Check Handlers
//!
//! Liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the process up?)
//! - `GET /health/ready` - Readiness probe (are Postgres and Redis reachable?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::infrastructure::metrics;
use crate::startup::AppState;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Pin the start time; call once during startup.
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    fn timed(latency_ms: u64, degraded_after_ms: u64) -> Self {
        Self {
            status: if latency_ms < degraded_after_ms {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            latency_ms: Some(latency_ms),
            message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Not configured; never affects readiness.
    Disabled,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe. 200 whenever the process can answer.
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe. 503 when Postgres is unreachable; a Redis problem only
/// degrades the service since rate limiting fails open.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let redis = check_redis(&state).await;
    let status = determine_overall_status(&database, &redis);

    let response = DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks { database, redis },
    };

    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (code, Json(response))
}

async fn check_database(state: &AppState) -> ServiceHealth {
    let idle = state.db.num_idle() as u32;
    metrics::update_db_pool_stats(
        idle,
        state.db.size().saturating_sub(idle),
        state.settings.database.max_connections,
    );

    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => ServiceHealth::timed(start.elapsed().as_millis() as u64, 100),
        Err(e) => ServiceHealth::failed(format!("Database connection failed: {}", e)),
    }
}

async fn check_redis(state: &AppState) -> ServiceHealth {
    let Some(mut conn) = state.redis.clone() else {
        return ServiceHealth {
            status: HealthStatus::Disabled,
            latency_ms: None,
            message: None,
        };
    };

    let start = Instant::now();
    match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => ServiceHealth::timed(start.elapsed().as_millis() as u64, 50),
        Err(e) => ServiceHealth::failed(format!("Redis connection failed: {}", e)),
    }
}

fn determine_overall_status(db: &ServiceHealth, redis: &ServiceHealth) -> HealthStatus {
    if db.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }

    if db.status == HealthStatus::Degraded
        || matches!(redis.status, HealthStatus::Unhealthy | HealthStatus::Degraded)
    {
        return HealthStatus::Degraded;
    }

    HealthStatus::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(status: HealthStatus) -> ServiceHealth {
        ServiceHealth {
            status,
            latency_ms: None,
            message: None,
        }
    }

    #[test]
    fn test_health_status_serialization() {
        let json = serde_json::to_string(&HealthStatus::Disabled).unwrap();
        assert_eq!(json, "\"disabled\"");
    }

    #[test]
    fn test_timed_threshold() {
        assert_eq!(ServiceHealth::timed(10, 100).status, HealthStatus::Healthy);
        assert_eq!(ServiceHealth::timed(100, 100).status, HealthStatus::Degraded);
    }

    #[test]
    fn test_determine_overall_status() {
        use HealthStatus::*;

        assert_eq!(determine_overall_status(&health(Healthy), &health(Healthy)), Healthy);
        assert_eq!(determine_overall_status(&health(Healthy), &health(Disabled)), Healthy);
        assert_eq!(determine_overall_status(&health(Healthy), &health(Unhealthy)), Degraded);
        assert_eq!(determine_overall_status(&health(Degraded), &health(Healthy)), Degraded);
        assert_eq!(determine_overall_status(&health(Unhealthy), &health(Healthy)), Unhealthy);
    }
}
