//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, route, and status
//! - HTTP request latency histograms
//! - Outcomes of outbound verification calls (Turnstile, Google, Vision)
//! - Counter backfill runs and recomputed memories
//! - Database connection pool gauges

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "omsim_social";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, route, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Outbound verification calls by provider and outcome
pub static VERIFICATION_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "verification_outcomes_total",
            "Outcomes of third-party verification calls",
        )
        .namespace(NAMESPACE),
        // provider: "turnstile" | "google" | "vision"
        // outcome: "passed" | "rejected" | "unavailable" | "skipped"
        &["provider", "outcome"],
    )
    .expect("Failed to create VERIFICATION_OUTCOMES metric")
});

/// Completed counter backfill passes
pub static COUNTER_BACKFILL_RUNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "counter_backfill_runs_total",
            "Completed passes of the memory counter backfill job",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create COUNTER_BACKFILL_RUNS metric")
});

/// Memories whose counters were recomputed by the backfill job
pub static COUNTER_BACKFILL_PROCESSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "counter_backfill_processed_total",
            "Memories recomputed by the counter backfill job",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create COUNTER_BACKFILL_PROCESSED metric")
});

/// Database connection pool stats
pub static DB_POOL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_pool_connections", "Database connection pool statistics")
            .namespace(NAMESPACE),
        &["state"], // "idle", "active", "max"
    )
    .expect("Failed to create DB_POOL_CONNECTIONS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(VERIFICATION_OUTCOMES.clone()))
        .expect("Failed to register VERIFICATION_OUTCOMES");
    registry
        .register(Box::new(COUNTER_BACKFILL_RUNS.clone()))
        .expect("Failed to register COUNTER_BACKFILL_RUNS");
    registry
        .register(Box::new(COUNTER_BACKFILL_PROCESSED.clone()))
        .expect("Failed to register COUNTER_BACKFILL_PROCESSED");
    registry
        .register(Box::new(DB_POOL_CONNECTIONS.clone()))
        .expect("Failed to register DB_POOL_CONNECTIONS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to record a verification outcome
pub fn record_verification(provider: &str, outcome: &str) {
    VERIFICATION_OUTCOMES
        .with_label_values(&[provider, outcome])
        .inc();
}

/// Helper to record one backfill pass
pub fn record_counter_backfill(processed: u64) {
    COUNTER_BACKFILL_RUNS.inc();
    COUNTER_BACKFILL_PROCESSED.inc_by(processed);
}

/// Helper to update database pool stats
pub fn update_db_pool_stats(idle: u32, active: u32, max: u32) {
    DB_POOL_CONNECTIONS
        .with_label_values(&["idle"])
        .set(idle as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["active"])
        .set(active as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["max"])
        .set(max as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*HTTP_REQUESTS_TOTAL;
        let _ = &*VERIFICATION_OUTCOMES;
        let _ = &*COUNTER_BACKFILL_RUNS;
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, 0.001);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("omsim_social_http_requests_total"));
    }

    #[test]
    fn test_record_verification_and_backfill() {
        record_verification("turnstile", "passed");
        record_counter_backfill(3);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("verification_outcomes_total"));
        assert!(metrics.contains("counter_backfill_processed_total"));
    }
}
