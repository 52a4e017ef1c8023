//! Integration Tests Entry Point
//!
//! - `api/` - REST API endpoint tests
//! - `repositories/` - PostgreSQL repository tests, skipped without `DATABASE_URL`
//! - `common/` - Shared test utilities

mod api;
mod common;
mod repositories;
