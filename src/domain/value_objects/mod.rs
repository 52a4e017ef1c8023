//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **UserPair**: Canonical (lower id first) pair of two distinct users
//! - **MemoryScope**: Who a memory is shared with

mod memory_scope;
mod user_pair;

pub use memory_scope::*;
pub use user_pair::*;
