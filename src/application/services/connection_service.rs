//! Connection Service
//!
//! Connections are one row per pair. The side that did not request answers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::application::dto::response::UserSummaryDto;
use crate::domain::{
    Connection, ConnectionRepository, ConnectionStatus, Notification, NotificationKind,
    NotificationRepository, SocialGraph, UserPair,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait ConnectionService: Send + Sync {
    async fn request(&self, user_id: i64, peer_id: i64) -> Result<ConnectionDto, ConnectionError>;

    async fn accept(&self, user_id: i64, peer_id: i64) -> Result<ConnectionDto, ConnectionError>;

    async fn remove(&self, user_id: i64, peer_id: i64) -> Result<(), ConnectionError>;

    async fn list(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, ConnectionError>;

    async fn incoming(&self, user_id: i64, limit: i64) -> Result<Vec<ConnectionDto>, ConnectionError>;

    async fn status(&self, user_id: i64, peer_id: i64) -> Result<ConnectionStateDto, ConnectionError>;
}

/// A connection as seen by one side.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionDto {
    pub peer_id: String,
    pub requested_by: String,
    pub status: String,
    pub created_at: String,
    pub accepted_at: Option<String>,
}

impl ConnectionDto {
    pub fn for_viewer(connection: Connection, viewer_id: i64) -> Self {
        Self {
            peer_id: connection.peer_of(viewer_id).to_string(),
            requested_by: connection.requested_by.to_string(),
            status: connection.status.as_str().to_string(),
            created_at: connection.created_at.to_rfc3339(),
            accepted_at: connection.accepted_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    None,
    PendingOutgoing,
    PendingIncoming,
    Connected,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStateDto {
    pub peer_id: String,
    pub state: ConnectionState,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("You cannot connect with yourself")]
    SelfConnection,

    #[error("User not found")]
    UserNotFound,

    #[error("Connection not found")]
    NotFound,

    #[error("A connection with this user already exists")]
    AlreadyExists,

    #[error("Only the invited user can accept")]
    NotInvitee,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ConnectionError> for AppError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::SelfConnection => AppError::BadRequest(err.to_string()),
            ConnectionError::UserNotFound | ConnectionError::NotFound => {
                AppError::NotFound(err.to_string())
            }
            ConnectionError::AlreadyExists => AppError::Conflict(err.to_string()),
            ConnectionError::NotInvitee => AppError::Forbidden(err.to_string()),
            ConnectionError::Store(e) => e,
        }
    }
}

pub struct ConnectionServiceImpl<C, G, N>
where
    C: ConnectionRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    connection_repo: Arc<C>,
    graph: Arc<G>,
    notification_repo: Arc<N>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<C, G, N> ConnectionServiceImpl<C, G, N>
where
    C: ConnectionRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    pub fn new(
        connection_repo: Arc<C>,
        graph: Arc<G>,
        notification_repo: Arc<N>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            connection_repo,
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
    ) -> Result<(), ConnectionError> {
        let notification = Notification::new(
            self.id_generator.generate(),
            user_id,
            actor_id,
            kind,
            Some(actor_id),
        );
        self.notification_repo.create(&notification).await?;
        Ok(())
    }

    async fn accept_pair(
        &self,
        pair: UserPair,
        user_id: i64,
        peer_id: i64,
    ) -> Result<ConnectionDto, ConnectionError> {
        let notification = Notification::new(
            self.id_generator.generate(),
            peer_id,
            user_id,
            NotificationKind::ConnectionAccepted,
            Some(user_id),
        );
        let accepted = self
            .connection_repo
            .accept(pair, &notification)
            .await?
            .ok_or(ConnectionError::NotFound)?;
        Ok(ConnectionDto::for_viewer(accepted, user_id))
    }
}

fn pair(a: i64, b: i64) -> Result<UserPair, ConnectionError> {
    UserPair::new(a, b).map_err(|_| ConnectionError::SelfConnection)
}

#[async_trait]
impl<C, G, N> ConnectionService for ConnectionServiceImpl<C, G, N>
where
    C: ConnectionRepository + 'static,
    G: SocialGraph + 'static,
    N: NotificationRepository + 'static,
{
    async fn request(&self, user_id: i64, peer_id: i64) -> Result<ConnectionDto, ConnectionError> {
        let pair = pair(user_id, peer_id)?;
        if !self.graph.user_exists(peer_id).await? {
            return Err(ConnectionError::UserNotFound);
        }

        if let Some(existing) = self.connection_repo.find(pair).await? {
            // Crossing requests: the peer already asked us
            if existing.awaits_answer_from(user_id) {
                return self.accept_pair(pair, user_id, peer_id).await;
            }
            return Err(ConnectionError::AlreadyExists);
        }

        let created = self
            .connection_repo
            .create_pending(pair, user_id)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => ConnectionError::AlreadyExists,
                e => ConnectionError::Store(e),
            })?;
        self.notify(peer_id, user_id, NotificationKind::ConnectionRequest)
            .await?;

        Ok(ConnectionDto::for_viewer(created, user_id))
    }

    async fn accept(&self, user_id: i64, peer_id: i64) -> Result<ConnectionDto, ConnectionError> {
        let pair = pair(user_id, peer_id)?;
        let existing = self
            .connection_repo
            .find(pair)
            .await?
            .ok_or(ConnectionError::NotFound)?;

        match existing.status {
            ConnectionStatus::Accepted => Err(ConnectionError::AlreadyExists),
            ConnectionStatus::Pending if existing.requested_by == user_id => {
                Err(ConnectionError::NotInvitee)
            }
            ConnectionStatus::Pending => self.accept_pair(pair, user_id, peer_id).await,
        }
    }

    async fn remove(&self, user_id: i64, peer_id: i64) -> Result<(), ConnectionError> {
        let pair = pair(user_id, peer_id)?;
        if !self.connection_repo.delete(pair).await? {
            return Err(ConnectionError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, user_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, ConnectionError> {
        let peers = self
            .connection_repo
            .list_accepted(user_id, page.before, page.limit)
            .await?;
        Ok(peers.into_iter().map(UserSummaryDto::from).collect())
    }

    async fn incoming(&self, user_id: i64, limit: i64) -> Result<Vec<ConnectionDto>, ConnectionError> {
        let rows = self.connection_repo.list_incoming(user_id, limit).await?;
        Ok(rows
            .into_iter()
            .map(|c| ConnectionDto::for_viewer(c, user_id))
            .collect())
    }

    async fn status(&self, user_id: i64, peer_id: i64) -> Result<ConnectionStateDto, ConnectionError> {
        let pair = pair(user_id, peer_id)?;
        let state = match self.connection_repo.find(pair).await? {
            None => ConnectionState::None,
            Some(c) if c.status == ConnectionStatus::Accepted => ConnectionState::Connected,
            Some(c) if c.requested_by == user_id => ConnectionState::PendingOutgoing,
            Some(_) => ConnectionState::PendingIncoming,
        };

        Ok(ConnectionStateDto {
            peer_id: peer_id.to_string(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockConnectionRepository, MockNotificationRepository, MockSocialGraph};
    use chrono::Utc;
    use test_case::test_case;

    fn row(requested_by: i64, status: ConnectionStatus) -> Connection {
        Connection {
            user_low_id: 1,
            user_high_id: 2,
            requested_by,
            status,
            created_at: Utc::now(),
            accepted_at: None,
        }
    }

    fn service(
        repo: MockConnectionRepository,
    ) -> ConnectionServiceImpl<MockConnectionRepository, MockSocialGraph, MockNotificationRepository>
    {
        let mut graph = MockSocialGraph::new();
        graph.expect_user_exists().returning(|_| Ok(true));
        let mut notifications = MockNotificationRepository::new();
        notifications.expect_create().returning(|n| Ok(n.clone()));
        ConnectionServiceImpl::new(
            Arc::new(repo),
            Arc::new(graph),
            Arc::new(notifications),
            Arc::new(SnowflakeGenerator::new(1, 1)),
        )
    }

    #[tokio::test]
    async fn test_request_creates_pending_row() {
        let mut repo = MockConnectionRepository::new();
        repo.expect_find().returning(|_| Ok(None));
        repo.expect_create_pending()
            .withf(|pair, by| pair.low() == 1 && pair.high() == 2 && *by == 2)
            .returning(|_, by| Ok(row(by, ConnectionStatus::Pending)));

        let dto = service(repo).request(2, 1).await.unwrap();
        assert_eq!(dto.status, "pending");
        assert_eq!(dto.peer_id, "1");
    }

    #[tokio::test]
    async fn test_crossing_request_accepts() {
        let mut repo = MockConnectionRepository::new();
        repo.expect_find()
            .returning(|_| Ok(Some(row(1, ConnectionStatus::Pending))));
        repo.expect_accept()
            .withf(|_, n| {
                n.user_id == 1 && n.actor_id == Some(2) && n.kind == NotificationKind::ConnectionAccepted
            })
            .times(1)
            .returning(|_, _| Ok(Some(row(1, ConnectionStatus::Accepted))));
        repo.expect_create_pending().never();

        let dto = service(repo).request(2, 1).await.unwrap();
        assert_eq!(dto.status, "accepted");
    }

    #[tokio::test]
    async fn test_repeat_request_conflicts() {
        let mut repo = MockConnectionRepository::new();
        repo.expect_find()
            .returning(|_| Ok(Some(row(2, ConnectionStatus::Pending))));

        let err = service(repo).request(2, 1).await.unwrap_err();
        assert!(matches!(err, ConnectionError::AlreadyExists));
    }

    #[tokio::test]
    async fn test_requester_cannot_accept() {
        let mut repo = MockConnectionRepository::new();
        repo.expect_find()
            .returning(|_| Ok(Some(row(2, ConnectionStatus::Pending))));
        repo.expect_accept().never();

        let err = service(repo).accept(2, 1).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotInvitee));
    }

    #[test_case(None, 1, ConnectionState::None)]
    #[test_case(Some(row(1, ConnectionStatus::Pending)), 1, ConnectionState::PendingOutgoing)]
    #[test_case(Some(row(1, ConnectionStatus::Pending)), 2, ConnectionState::PendingIncoming)]
    #[test_case(Some(row(1, ConnectionStatus::Accepted)), 2, ConnectionState::Connected)]
    #[tokio::test]
    async fn test_status(existing: Option<Connection>, viewer: i64, expected: ConnectionState) {
        let mut repo = MockConnectionRepository::new();
        repo.expect_find().returning(move |_| Ok(existing.clone()));

        let peer = if viewer == 1 { 2 } else { 1 };
        let dto = service(repo).status(viewer, peer).await.unwrap();
        assert_eq!(dto.state, expected);
    }
}
