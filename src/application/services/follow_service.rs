//! Follow Service

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::response::UserSummaryDto;
use crate::domain::{
    FollowCounts, FollowRepository, Notification, NotificationKind, NotificationRepository,
    SocialGraph,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait FollowService: Send + Sync {
    /// Follow a user. Following twice is a no-op.
    async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<FollowCounts, FollowError>;

    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<FollowCounts, FollowError>;

    async fn followers(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, FollowError>;

    async fn following(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, FollowError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    #[error("You cannot follow yourself")]
    SelfFollow,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<FollowError> for AppError {
    fn from(err: FollowError) -> Self {
        match err {
            FollowError::SelfFollow => AppError::BadRequest(err.to_string()),
            FollowError::UserNotFound => AppError::NotFound(err.to_string()),
            FollowError::Store(e) => e,
        }
    }
}

pub struct FollowServiceImpl<F, G, N>
where
    F: FollowRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    follow_repo: Arc<F>,
    graph: Arc<G>,
    notification_repo: Arc<N>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<F, G, N> FollowServiceImpl<F, G, N>
where
    F: FollowRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    pub fn new(
        follow_repo: Arc<F>,
        graph: Arc<G>,
        notification_repo: Arc<N>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            follow_repo,
            graph,
            notification_repo,
            id_generator,
        }
    }

    async fn ensure_user(&self, user_id: i64) -> Result<(), FollowError> {
        if self.graph.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(FollowError::UserNotFound)
        }
    }
}

#[async_trait]
impl<F, G, N> FollowService for FollowServiceImpl<F, G, N>
where
    F: FollowRepository + 'static,
    G: SocialGraph + 'static,
    N: NotificationRepository + 'static,
{
    async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<FollowCounts, FollowError> {
        if follower_id == followee_id {
            return Err(FollowError::SelfFollow);
        }
        self.ensure_user(followee_id).await?;

        if self.follow_repo.follow(follower_id, followee_id).await? {
            let notification = Notification::new(
                self.id_generator.generate(),
                followee_id,
                follower_id,
                NotificationKind::NewFollower,
                Some(follower_id),
            );
            self.notification_repo.create(&notification).await?;
        }

        Ok(self.follow_repo.counts(followee_id).await?)
    }

    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<FollowCounts, FollowError> {
        if follower_id == followee_id {
            return Err(FollowError::SelfFollow);
        }
        self.follow_repo.unfollow(follower_id, followee_id).await?;
        Ok(self.follow_repo.counts(followee_id).await?)
    }

    async fn followers(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, FollowError> {
        self.ensure_user(user_id).await?;
        let users = self
            .follow_repo
            .followers(user_id, page.before, page.limit)
            .await?;
        Ok(users.into_iter().map(UserSummaryDto::from).collect())
    }

    async fn following(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, FollowError> {
        self.ensure_user(user_id).await?;
        let users = self
            .follow_repo
            .following(user_id, page.before, page.limit)
            .await?;
        Ok(users.into_iter().map(UserSummaryDto::from).collect())
    }
}
