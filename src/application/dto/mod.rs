//! Data Transfer Objects
//!
//! DTOs for API request/response serialization. Service-specific response
//! DTOs live next to their services.

pub mod request;
pub mod response;
