//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! This module provides concrete implementations of the repository traits
//! defined in the domain layer. Each repository handles data access for
//! a specific entity type.
//!
//! ## Available Repositories
//!
//! - **UserRepository** - Accounts and profiles
//! - **SessionRepository** - Refresh token sessions
//! - **FollowRepository / FriendshipRepository / ConnectionRepository** - Social graph
//! - **CircleRepository** - Circles and membership
//! - **MemoryRepository** - Memories, comments, hearts, vault and counter backfill
//! - **MessageRepository** - Direct messages with cursor pagination
//! - **CallRepository / LiveRoomRepository / SignalRepository** - Realtime signaling
//! - **NotificationRepository** - Inbox
//! - **ReportRepository / AdminRepository** - Moderation and audit log
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgMemoryRepository, PgSocialGraph};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let memory_repo = PgMemoryRepository::new(pool.clone());
//!     let graph = PgSocialGraph::new(pool.clone());
//! }
//! ```

pub mod admin_repository;
pub mod call_repository;
pub mod circle_repository;
pub mod connection_repository;
pub mod follow_repository;
pub mod friendship_repository;
pub mod live_room_repository;
pub mod memory_repository;
pub mod message_repository;
pub mod notification_repository;
pub mod report_repository;
pub mod session_repository;
pub mod signal_repository;
pub mod social_graph;
pub mod user_repository;

pub use admin_repository::PgAdminRepository;
pub use call_repository::PgCallRepository;
pub use circle_repository::PgCircleRepository;
pub use connection_repository::PgConnectionRepository;
pub use follow_repository::PgFollowRepository;
pub use friendship_repository::PgFriendshipRepository;
pub use live_room_repository::PgLiveRoomRepository;
pub use memory_repository::PgMemoryRepository;
pub use message_repository::PgMessageRepository;
pub use notification_repository::PgNotificationRepository;
pub use report_repository::PgReportRepository;
pub use session_repository::PgSessionRepository;
pub use signal_repository::PgSignalRepository;
pub use social_graph::PgSocialGraph;
pub use user_repository::PgUserRepository;

/// Build an `ILIKE` substring pattern, escaping the wildcard characters.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
