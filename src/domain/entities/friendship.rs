//! Friend requests, friendships and their repository trait.
//!
//! Maps to the `friend_requests` and `friendships` tables. A friendship is
//! stored once per canonical [`UserPair`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::notification::Notification;
use super::user::UserSummary;
use crate::domain::value_objects::UserPair;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl FriendRequestStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            "declined" => Self::Declined,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A directed friend request.
///
/// Maps to the `friend_requests` table. A partial unique index on
/// `(sender_id, recipient_id) WHERE status = 'pending'` keeps at most one
/// open request per direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl FriendRequest {
    pub fn new(id: i64, sender_id: i64, recipient_id: i64) -> Self {
        Self {
            id,
            sender_id,
            recipient_id,
            status: FriendRequestStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == FriendRequestStatus::Pending
    }
}

/// An accepted, undirected friendship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friendship {
    pub user_low_id: i64,
    pub user_high_id: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FriendshipRepository: Send + Sync {
    async fn find_request(&self, id: i64) -> Result<Option<FriendRequest>, AppError>;

    /// Pending request sent by `sender_id` to `recipient_id`, if any.
    async fn find_pending(
        &self,
        sender_id: i64,
        recipient_id: i64,
    ) -> Result<Option<FriendRequest>, AppError>;

    /// Insert a pending request. Conflict when one is already pending.
    async fn create_request(&self, request: &FriendRequest) -> Result<FriendRequest, AppError>;

    /// Mark the request accepted, insert the friendship row and the sender's
    /// notification, atomically.
    ///
    /// Returns `None` when the request is no longer pending.
    async fn accept_request(
        &self,
        request_id: i64,
        pair: UserPair,
        notification: &Notification,
    ) -> Result<Option<Friendship>, AppError>;

    /// Move a pending request to `declined` or `cancelled`.
    /// Returns false when the request is no longer pending.
    async fn close_request(
        &self,
        request_id: i64,
        status: FriendRequestStatus,
    ) -> Result<bool, AppError>;

    async fn are_friends(&self, pair: UserPair) -> Result<bool, AppError>;

    async fn delete_friendship(&self, pair: UserPair) -> Result<bool, AppError>;

    async fn list_friends(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError>;

    async fn incoming_requests(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<FriendRequest>, AppError>;

    async fn outgoing_requests(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<FriendRequest>, AppError>;
}
