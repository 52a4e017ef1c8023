//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod admin;
pub mod auth;
pub mod call;
pub mod circle;
pub mod health;
pub mod inbox;
pub mod live_room;
pub mod media;
pub mod memory;
pub mod message;
pub mod report;
pub mod social;
pub mod user;
