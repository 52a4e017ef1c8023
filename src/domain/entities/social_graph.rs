//! Read-only relationship queries shared by the content services.

use async_trait::async_trait;

use crate::domain::value_objects::UserPair;
use crate::shared::error::AppError;

/// What a viewer is to an author, as far as visibility is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerRelation {
    pub follows_author: bool,
    pub friends_with_author: bool,
    /// Only meaningful for circle-scoped content.
    pub circle_member: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// True for existing, non-suspended users.
    async fn user_exists(&self, user_id: i64) -> Result<bool, AppError>;

    async fn are_friends(&self, pair: UserPair) -> Result<bool, AppError>;

    async fn is_circle_member(&self, circle_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Resolve follow, friendship and (optionally) circle membership in one
    /// round trip.
    async fn relation(
        &self,
        viewer_id: i64,
        author_id: i64,
        circle_id: Option<i64>,
    ) -> Result<ViewerRelation, AppError>;
}
