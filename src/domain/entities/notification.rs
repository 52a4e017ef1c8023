//! Inbox notification entity and repository trait.
//!
//! Maps to the `notifications` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewFollower,
    FriendRequest,
    FriendAccepted,
    ConnectionRequest,
    ConnectionAccepted,
    MemoryComment,
    MemoryHeart,
    MemoryAdopted,
    DirectMemory,
    CircleAdded,
}

impl NotificationKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "new_follower" => Self::NewFollower,
            "friend_request" => Self::FriendRequest,
            "friend_accepted" => Self::FriendAccepted,
            "connection_request" => Self::ConnectionRequest,
            "connection_accepted" => Self::ConnectionAccepted,
            "memory_comment" => Self::MemoryComment,
            "memory_heart" => Self::MemoryHeart,
            "memory_adopted" => Self::MemoryAdopted,
            "direct_memory" => Self::DirectMemory,
            "circle_added" => Self::CircleAdded,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewFollower => "new_follower",
            Self::FriendRequest => "friend_request",
            Self::FriendAccepted => "friend_accepted",
            Self::ConnectionRequest => "connection_request",
            Self::ConnectionAccepted => "connection_accepted",
            Self::MemoryComment => "memory_comment",
            Self::MemoryHeart => "memory_heart",
            Self::MemoryAdopted => "memory_adopted",
            Self::DirectMemory => "direct_memory",
            Self::CircleAdded => "circle_added",
        }
    }
}

/// An inbox entry for `user_id`, caused by `actor_id`.
///
/// `subject_id` points at the memory, circle, request or comment the entry
/// is about; its table depends on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub actor_id: Option<i64>,
    pub kind: NotificationKind,
    pub subject_id: Option<i64>,
    pub data: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        id: i64,
        user_id: i64,
        actor_id: i64,
        kind: NotificationKind,
        subject_id: Option<i64>,
    ) -> Self {
        Self {
            id,
            user_id,
            actor_id: Some(actor_id),
            kind,
            subject_id,
            data: serde_json::Value::Object(Default::default()),
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError>;

    /// Newest first.
    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError>;

    /// Mark the given entries read. Ids owned by other users are ignored.
    async fn mark_read(&self, user_id: i64, ids: Vec<i64>) -> Result<u64, AppError>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            NotificationKind::NewFollower,
            NotificationKind::FriendRequest,
            NotificationKind::FriendAccepted,
            NotificationKind::ConnectionRequest,
            NotificationKind::ConnectionAccepted,
            NotificationKind::MemoryComment,
            NotificationKind::MemoryHeart,
            NotificationKind::MemoryAdopted,
            NotificationKind::DirectMemory,
            NotificationKind::CircleAdded,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(NotificationKind::parse("mention"), None);
    }
}
