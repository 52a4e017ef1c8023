//! Connection entity and repository trait.
//!
//! A connection is a single row per canonical user pair that starts
//! `pending` and becomes `accepted` when the non-requesting side agrees.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::notification::Notification;
use super::user::UserSummary;
use crate::domain::value_objects::UserPair;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Pending,
    Accepted,
}

impl ConnectionStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

/// Maps to the `connections` table:
/// - (user_low_id, user_high_id): PRIMARY KEY, CHECK (user_low_id < user_high_id)
/// - requested_by: BIGINT NOT NULL, one of the pair
/// - status: VARCHAR(16) CHECK IN ('pending', 'accepted')
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub user_low_id: i64,
    pub user_high_id: i64,
    pub requested_by: i64,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// The member of the pair that is not `user_id`.
    pub fn peer_of(&self, user_id: i64) -> i64 {
        if user_id == self.user_low_id {
            self.user_high_id
        } else {
            self.user_low_id
        }
    }

    /// True when `user_id` is the side that has to answer a pending request.
    pub fn awaits_answer_from(&self, user_id: i64) -> bool {
        self.status == ConnectionStatus::Pending && self.requested_by != user_id
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn find(&self, pair: UserPair) -> Result<Option<Connection>, AppError>;

    /// Insert a pending row. Conflict when the pair already has one.
    async fn create_pending(
        &self,
        pair: UserPair,
        requested_by: i64,
    ) -> Result<Connection, AppError>;

    /// Flip a pending row to accepted and insert `notification` in the same
    /// transaction. `None` when nothing was pending.
    async fn accept(
        &self,
        pair: UserPair,
        notification: &Notification,
    ) -> Result<Option<Connection>, AppError>;

    async fn delete(&self, pair: UserPair) -> Result<bool, AppError>;

    /// Accepted connections of `user_id`, peer id descending.
    async fn list_accepted(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError>;

    /// Pending rows `user_id` has to answer.
    async fn list_incoming(&self, user_id: i64, limit: i64) -> Result<Vec<Connection>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(requested_by: i64) -> Connection {
        Connection {
            user_low_id: 1,
            user_high_id: 2,
            requested_by,
            status: ConnectionStatus::Pending,
            created_at: Utc::now(),
            accepted_at: None,
        }
    }

    #[test]
    fn test_peer_of() {
        let c = pending(1);
        assert_eq!(c.peer_of(1), 2);
        assert_eq!(c.peer_of(2), 1);
    }

    #[test]
    fn test_awaits_answer_only_from_non_requester() {
        let c = pending(1);
        assert!(c.awaits_answer_from(2));
        assert!(!c.awaits_answer_from(1));

        let accepted = Connection {
            status: ConnectionStatus::Accepted,
            ..pending(1)
        };
        assert!(!accepted.awaits_answer_from(2));
    }
}
