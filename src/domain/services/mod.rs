//! # Domain Services
//!
//! Domain services encapsulate business rules that don't naturally belong
//! to a single entity.
//!
//! ## Services
//!
//! - **VisibilityPolicy**: Who may see a memory, and which timeline scopes apply
//! - **Verification**: Contracts for captcha, Google identity and image moderation providers

mod verification;
mod visibility_policy;

pub use verification::*;
pub use visibility_policy::*;
