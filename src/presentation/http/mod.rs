//! HTTP surface: extractors, handlers and the router.

pub mod extractors;
pub mod handlers;
pub mod routes;
