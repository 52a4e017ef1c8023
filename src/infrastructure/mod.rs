//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Redis connection for rate limiting
//! - Prometheus metrics
//! - Local media storage
//! - Third-party verification clients (Turnstile, Google, Vision)

pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
pub mod storage;
pub mod verification;
