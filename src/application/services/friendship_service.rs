//! Friendship Service
//!
//! Friend request workflow. Accepting a request inserts the canonical
//! friendship row in the same transaction that closes the request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::application::dto::response::UserSummaryDto;
use crate::domain::{
    FriendRequest, FriendRequestStatus, FriendshipRepository, Notification, NotificationKind,
    NotificationRepository, SocialGraph, UserPair,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait FriendshipService: Send + Sync {
    /// Send a request. An incoming pending request from the target is
    /// accepted instead.
    async fn send_request(&self, sender_id: i64, recipient_id: i64) -> Result<FriendRequestDto, FriendshipError>;

    async fn accept(&self, user_id: i64, request_id: i64) -> Result<FriendRequestDto, FriendshipError>;

    async fn decline(&self, user_id: i64, request_id: i64) -> Result<(), FriendshipError>;

    async fn cancel(&self, user_id: i64, request_id: i64) -> Result<(), FriendshipError>;

    async fn unfriend(&self, user_id: i64, other_id: i64) -> Result<(), FriendshipError>;

    async fn are_friends(&self, a: i64, b: i64) -> Result<bool, FriendshipError>;

    async fn list_friends(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, FriendshipError>;

    async fn incoming(&self, user_id: i64, page: Page) -> Result<Vec<FriendRequestDto>, FriendshipError>;

    async fn outgoing(&self, user_id: i64, page: Page) -> Result<Vec<FriendRequestDto>, FriendshipError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct FriendRequestDto {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub status: String,
    pub created_at: String,
    pub responded_at: Option<String>,
}

impl From<FriendRequest> for FriendRequestDto {
    fn from(request: FriendRequest) -> Self {
        Self {
            id: request.id.to_string(),
            sender_id: request.sender_id.to_string(),
            recipient_id: request.recipient_id.to_string(),
            status: request.status.as_str().to_string(),
            created_at: request.created_at.to_rfc3339(),
            responded_at: request.responded_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FriendshipError {
    #[error("You cannot befriend yourself")]
    SelfRequest,

    #[error("User not found")]
    UserNotFound,

    #[error("Friend request not found")]
    RequestNotFound,

    #[error("Friend request is no longer pending")]
    NotPending,

    #[error("You are already friends")]
    AlreadyFriends,

    #[error("A friend request is already pending")]
    AlreadyRequested,

    #[error("Not friends")]
    NotFriends,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<FriendshipError> for AppError {
    fn from(err: FriendshipError) -> Self {
        match err {
            FriendshipError::SelfRequest => AppError::BadRequest(err.to_string()),
            FriendshipError::UserNotFound
            | FriendshipError::RequestNotFound
            | FriendshipError::NotFriends => AppError::NotFound(err.to_string()),
            FriendshipError::NotPending
            | FriendshipError::AlreadyFriends
            | FriendshipError::AlreadyRequested => AppError::Conflict(err.to_string()),
            FriendshipError::Store(e) => e,
        }
    }
}

fn pair(a: i64, b: i64) -> Result<UserPair, FriendshipError> {
    UserPair::new(a, b).map_err(|_| FriendshipError::SelfRequest)
}

pub struct FriendshipServiceImpl<R, G, N>
where
    R: FriendshipRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    friendship_repo: Arc<R>,
    graph: Arc<G>,
    notification_repo: Arc<N>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R, G, N> FriendshipServiceImpl<R, G, N>
where
    R: FriendshipRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    pub fn new(
        friendship_repo: Arc<R>,
        graph: Arc<G>,
        notification_repo: Arc<N>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            friendship_repo,
            graph,
            notification_repo,
            id_generator,
        }
    }

    async fn notify(
        &self,
        user_id: i64,
        actor_id: i64,
        kind: NotificationKind,
        subject_id: i64,
    ) -> Result<(), FriendshipError> {
        let notification = Notification::new(
            self.id_generator.generate(),
            user_id,
            actor_id,
            kind,
            Some(subject_id),
        );
        self.notification_repo.create(&notification).await?;
        Ok(())
    }

    /// Accept a pending request addressed to `recipient_id`.
    async fn accept_pending(
        &self,
        mut request: FriendRequest,
        recipient_id: i64,
    ) -> Result<FriendRequestDto, FriendshipError> {
        if request.recipient_id != recipient_id {
            return Err(FriendshipError::RequestNotFound);
        }
        if !request.is_pending() {
            return Err(FriendshipError::NotPending);
        }

        let pair = pair(request.sender_id, request.recipient_id)?;
        let notification = Notification::new(
            self.id_generator.generate(),
            request.sender_id,
            recipient_id,
            NotificationKind::FriendAccepted,
            Some(request.id),
        );
        let friendship = self
            .friendship_repo
            .accept_request(request.id, pair, &notification)
            .await?
            .ok_or(FriendshipError::NotPending)?;

        info!(
            low = friendship.user_low_id,
            high = friendship.user_high_id,
            "Friendship created"
        );

        request.status = FriendRequestStatus::Accepted;
        request.responded_at = Some(friendship.created_at);
        Ok(request.into())
    }

    async fn load_request(&self, request_id: i64) -> Result<FriendRequest, FriendshipError> {
        self.friendship_repo
            .find_request(request_id)
            .await?
            .ok_or(FriendshipError::RequestNotFound)
    }
}

#[async_trait]
impl<R, G, N> FriendshipService for FriendshipServiceImpl<R, G, N>
where
    R: FriendshipRepository + 'static,
    G: SocialGraph + 'static,
    N: NotificationRepository + 'static,
{
    async fn send_request(&self, sender_id: i64, recipient_id: i64) -> Result<FriendRequestDto, FriendshipError> {
        let pair = pair(sender_id, recipient_id)?;

        if !self.graph.user_exists(recipient_id).await? {
            return Err(FriendshipError::UserNotFound);
        }
        if self.friendship_repo.are_friends(pair).await? {
            return Err(FriendshipError::AlreadyFriends);
        }

        if let Some(incoming) = self
            .friendship_repo
            .find_pending(recipient_id, sender_id)
            .await?
        {
            return self.accept_pending(incoming, sender_id).await;
        }

        if self
            .friendship_repo
            .find_pending(sender_id, recipient_id)
            .await?
            .is_some()
        {
            return Err(FriendshipError::AlreadyRequested);
        }

        let request = FriendRequest::new(self.id_generator.generate(), sender_id, recipient_id);
        let created = self
            .friendship_repo
            .create_request(&request)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => FriendshipError::AlreadyRequested,
                e => FriendshipError::Store(e),
            })?;

        self.notify(
            recipient_id,
            sender_id,
            NotificationKind::FriendRequest,
            created.id,
        )
        .await?;

        Ok(created.into())
    }

    async fn accept(&self, user_id: i64, request_id: i64) -> Result<FriendRequestDto, FriendshipError> {
        let request = self.load_request(request_id).await?;
        self.accept_pending(request, user_id).await
    }

    async fn decline(&self, user_id: i64, request_id: i64) -> Result<(), FriendshipError> {
        let request = self.load_request(request_id).await?;
        if request.recipient_id != user_id {
            return Err(FriendshipError::RequestNotFound);
        }
        if !self
            .friendship_repo
            .close_request(request.id, FriendRequestStatus::Declined)
            .await?
        {
            return Err(FriendshipError::NotPending);
        }
        Ok(())
    }

    async fn cancel(&self, user_id: i64, request_id: i64) -> Result<(), FriendshipError> {
        let request = self.load_request(request_id).await?;
        if request.sender_id != user_id {
            return Err(FriendshipError::RequestNotFound);
        }
        if !self
            .friendship_repo
            .close_request(request.id, FriendRequestStatus::Cancelled)
            .await?
        {
            return Err(FriendshipError::NotPending);
        }
        Ok(())
    }

    async fn unfriend(&self, user_id: i64, other_id: i64) -> Result<(), FriendshipError> {
        let pair = pair(user_id, other_id)?;
        if !self.friendship_repo.delete_friendship(pair).await? {
            return Err(FriendshipError::NotFriends);
        }
        Ok(())
    }

    async fn are_friends(&self, a: i64, b: i64) -> Result<bool, FriendshipError> {
        match UserPair::new(a, b) {
            Ok(pair) => Ok(self.friendship_repo.are_friends(pair).await?),
            Err(_) => Ok(false),
        }
    }

    async fn list_friends(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, FriendshipError> {
        let friends = self
            .friendship_repo
            .list_friends(user_id, page.before, page.limit)
            .await?;
        Ok(friends.into_iter().map(UserSummaryDto::from).collect())
    }

    async fn incoming(&self, user_id: i64, page: Page) -> Result<Vec<FriendRequestDto>, FriendshipError> {
        let requests = self
            .friendship_repo
            .incoming_requests(user_id, page.before, page.limit)
            .await?;
        Ok(requests.into_iter().map(FriendRequestDto::from).collect())
    }

    async fn outgoing(&self, user_id: i64, page: Page) -> Result<Vec<FriendRequestDto>, FriendshipError> {
        let requests = self
            .friendship_repo
            .outgoing_requests(user_id, page.before, page.limit)
            .await?;
        Ok(requests.into_iter().map(FriendRequestDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Friendship, MockFriendshipRepository, MockNotificationRepository, MockSocialGraph,
    };
    use chrono::Utc;
    use mockall::predicate::*;

    type Svc = FriendshipServiceImpl<
        MockFriendshipRepository,
        MockSocialGraph,
        MockNotificationRepository,
    >;

    fn service(
        repo: MockFriendshipRepository,
        notifications: MockNotificationRepository,
    ) -> Svc {
        let mut graph = MockSocialGraph::new();
        graph.expect_user_exists().returning(|_| Ok(true));
        FriendshipServiceImpl::new(
            Arc::new(repo),
            Arc::new(graph),
            Arc::new(notifications),
            Arc::new(SnowflakeGenerator::new(1, 1)),
        )
    }

    fn any_notifications() -> MockNotificationRepository {
        let mut notifications = MockNotificationRepository::new();
        notifications.expect_create().returning(|n| Ok(n.clone()));
        notifications
    }

    fn friendship(pair: UserPair) -> Friendship {
        Friendship {
            user_low_id: pair.low(),
            user_high_id: pair.high(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_self_request_rejected() {
        let svc = service(MockFriendshipRepository::new(), MockNotificationRepository::new());
        let err = svc.send_request(4, 4).await.unwrap_err();
        assert!(matches!(err, FriendshipError::SelfRequest));
    }

    #[tokio::test]
    async fn test_already_friends_conflicts() {
        let mut repo = MockFriendshipRepository::new();
        repo.expect_are_friends().returning(|_| Ok(true));
        let svc = service(repo, MockNotificationRepository::new());
        let err = svc.send_request(1, 2).await.unwrap_err();
        assert_eq!(AppError::from(err).status(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_incoming_request_is_auto_accepted() {
        let mut repo = MockFriendshipRepository::new();
        repo.expect_are_friends().returning(|_| Ok(false));
        repo.expect_find_pending()
            .with(eq(2), eq(1))
            .returning(|s, r| Ok(Some(FriendRequest::new(99, s, r))));
        repo.expect_accept_request()
            .withf(|id, pair, n| {
                *id == 99
                    && *pair == UserPair::new(1, 2).unwrap()
                    && n.user_id == 2
                    && n.actor_id == Some(1)
                    && n.kind == NotificationKind::FriendAccepted
            })
            .times(1)
            .returning(|_, p, _| Ok(Some(friendship(p))));
        repo.expect_create_request().never();

        let dto = service(repo, any_notifications()).send_request(1, 2).await.unwrap();
        assert_eq!(dto.status, "accepted");
        assert_eq!(dto.id, "99");
    }

    #[tokio::test]
    async fn test_duplicate_outgoing_request_conflicts() {
        let mut repo = MockFriendshipRepository::new();
        repo.expect_are_friends().returning(|_| Ok(false));
        repo.expect_find_pending()
            .with(eq(2), eq(1))
            .returning(|_, _| Ok(None));
        repo.expect_find_pending()
            .with(eq(1), eq(2))
            .returning(|s, r| Ok(Some(FriendRequest::new(5, s, r))));

        let err = service(repo, MockNotificationRepository::new())
            .send_request(1, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, FriendshipError::AlreadyRequested));
    }

    #[tokio::test]
    async fn test_new_request_notifies_recipient() {
        let mut repo = MockFriendshipRepository::new();
        repo.expect_are_friends().returning(|_| Ok(false));
        repo.expect_find_pending().returning(|_, _| Ok(None));
        repo.expect_create_request().returning(|r| Ok(r.clone()));
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_create()
            .withf(|n| n.user_id == 2 && n.kind == NotificationKind::FriendRequest)
            .times(1)
            .returning(|n| Ok(n.clone()));

        let dto = service(repo, notifications).send_request(1, 2).await.unwrap();
        assert_eq!(dto.status, "pending");
    }

    #[tokio::test]
    async fn test_only_recipient_may_accept() {
        let mut repo = MockFriendshipRepository::new();
        repo.expect_find_request()
            .returning(|id| Ok(Some(FriendRequest::new(id, 1, 2))));
        repo.expect_accept_request().never();

        let err = service(repo, MockNotificationRepository::new())
            .accept(1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FriendshipError::RequestNotFound));
    }

    #[tokio::test]
    async fn test_accept_race_reports_not_pending() {
        let mut repo = MockFriendshipRepository::new();
        repo.expect_find_request()
            .returning(|id| Ok(Some(FriendRequest::new(id, 1, 2))));
        repo.expect_accept_request().returning(|_, _, _| Ok(None));

        let err = service(repo, MockNotificationRepository::new())
            .accept(2, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FriendshipError::NotPending));
    }

    #[tokio::test]
    async fn test_cancel_by_sender() {
        let mut repo = MockFriendshipRepository::new();
        repo.expect_find_request()
            .returning(|id| Ok(Some(FriendRequest::new(id, 1, 2))));
        repo.expect_close_request()
            .with(eq(10), eq(FriendRequestStatus::Cancelled))
            .returning(|_, _| Ok(true));

        assert!(service(repo, MockNotificationRepository::new())
            .cancel(1, 10)
            .await
            .is_ok());
    }
}
