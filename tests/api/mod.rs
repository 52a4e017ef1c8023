//! REST API tests against the full router

mod auth_tests;
mod guard_tests;
mod health_tests;
mod media_tests;
