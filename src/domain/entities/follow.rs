//! Follow edge and repository trait.
//!
//! Follows are directed: `follower_id` sees `followee_id`'s follower-scoped
//! memories and stories. Maps to the `follows` table with primary key
//! `(follower_id, followee_id)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use crate::shared::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: i64,
    pub followee_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Follower / following totals for a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert the edge. Returns false when it already existed.
    async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<bool, AppError>;

    /// Delete the edge. Returns false when it did not exist.
    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<bool, AppError>;

    /// Users following `user_id`, ordered by user id descending.
    async fn followers(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError>;

    /// Users `user_id` follows, ordered by user id descending.
    async fn following(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError>;

    async fn counts(&self, user_id: i64) -> Result<FollowCounts, AppError>;
}
