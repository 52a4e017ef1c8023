//! # Omsim Social
//!
//! REST API and admin backend for the Omsim Social network:
//! - Accounts with password, Google and Turnstile-guarded sign-up
//! - Follows, friendships, connections and circles
//! - Memories (posts, stories, direct and circle-scoped), comments, hearts,
//!   the vault and reshares
//! - Direct messages with optional end-to-end encrypted envelopes
//! - Call and live room signaling over polled relays
//! - Notifications inbox, safety reports and admin moderation tools
//!
//! ## Architecture
//!
//! - **Domain Layer**: Entities, value objects and repository traits
//! - **Application Layer**: Business services and DTOs
//! - **Infrastructure Layer**: PostgreSQL, Redis, storage and verification clients
//! - **Presentation Layer**: HTTP handlers, routes and middleware
//!
//! ## Module Structure
//!
//! ```text
//! omsim_social/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects, repository traits
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Database, cache, metrics, storage, verification
//! +-- presentation/   HTTP routes, handlers and middleware
//! +-- shared/         Errors, pagination, snowflake IDs, validation
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers and middleware
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
