//! Live Room Service
//!
//! Hosted rooms with a participant list. Signals from the host broadcast to
//! every participant unless addressed to one of them; an unaddressed signal
//! from a viewer goes to the host only. Addressed signals must name another
//! member of the room.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::application::dto::response::{SignalDto, UserSummaryDto};
use crate::domain::{
    LiveRoom, LiveRoomRepository, LiveRoomStatus, Signal, SignalChannel, SignalKind,
    SignalRepository,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

use super::call_service::MAX_SIGNAL_PAYLOAD_BYTES;

#[async_trait]
pub trait LiveRoomService: Send + Sync {
    async fn create(&self, host_id: i64, title: &str) -> Result<LiveRoomDto, LiveRoomError>;

    async fn get(&self, room_id: i64) -> Result<LiveRoomDto, LiveRoomError>;

    async fn list_live(&self, page: Page) -> Result<Vec<LiveRoomDto>, LiveRoomError>;

    async fn join(&self, user_id: i64, room_id: i64) -> Result<LiveRoomDto, LiveRoomError>;

    async fn leave(&self, user_id: i64, room_id: i64) -> Result<(), LiveRoomError>;

    async fn end(&self, user_id: i64, room_id: i64) -> Result<LiveRoomDto, LiveRoomError>;

    async fn participants(&self, room_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, LiveRoomError>;

    async fn send_signal(
        &self,
        user_id: i64,
        room_id: i64,
        recipient_id: Option<i64>,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<SignalDto, LiveRoomError>;

    async fn poll_signals(
        &self,
        user_id: i64,
        room_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<SignalDto>, LiveRoomError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveRoomDto {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub status: LiveRoomStatus,
    pub participant_count: i32,
    pub started_at: String,
    pub ended_at: Option<String>,
}

impl From<LiveRoom> for LiveRoomDto {
    fn from(room: LiveRoom) -> Self {
        Self {
            id: room.id.to_string(),
            host_id: room.host_id.to_string(),
            title: room.title,
            status: room.status,
            participant_count: room.participant_count,
            started_at: room.started_at.to_rfc3339(),
            ended_at: room.ended_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LiveRoomError {
    #[error("Live room not found")]
    NotFound,

    #[error("You already have a live room")]
    AlreadyHosting,

    #[error("The live room has ended")]
    Ended,

    #[error("Only the host can do this")]
    NotHost,

    #[error("The host cannot leave; end the room instead")]
    HostCannotLeave,

    #[error("You are not in this room")]
    NotParticipant,

    #[error("Signals must be addressed to another member of the room")]
    InvalidRecipient,

    #[error("Signal payload too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<LiveRoomError> for AppError {
    fn from(err: LiveRoomError) -> Self {
        match err {
            LiveRoomError::NotFound => AppError::NotFound(err.to_string()),
            LiveRoomError::AlreadyHosting | LiveRoomError::Ended => {
                AppError::Conflict(err.to_string())
            }
            LiveRoomError::NotHost | LiveRoomError::NotParticipant => {
                AppError::Forbidden(err.to_string())
            }
            LiveRoomError::HostCannotLeave => AppError::BadRequest(err.to_string()),
            LiveRoomError::PayloadTooLarge => AppError::field("payload", err.to_string()),
            LiveRoomError::InvalidRecipient => AppError::field("recipient_id", err.to_string()),
            LiveRoomError::Store(e) => e,
        }
    }
}

pub struct LiveRoomServiceImpl<L, S>
where
    L: LiveRoomRepository,
    S: SignalRepository,
{
    room_repo: Arc<L>,
    signal_repo: Arc<S>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<L, S> LiveRoomServiceImpl<L, S>
where
    L: LiveRoomRepository,
    S: SignalRepository,
{
    pub fn new(room_repo: Arc<L>, signal_repo: Arc<S>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            room_repo,
            signal_repo,
            id_generator,
        }
    }

    async fn load(&self, room_id: i64) -> Result<LiveRoom, LiveRoomError> {
        self.room_repo
            .find_by_id(room_id)
            .await?
            .ok_or(LiveRoomError::NotFound)
    }

    async fn load_live(&self, room_id: i64) -> Result<LiveRoom, LiveRoomError> {
        let room = self.load(room_id).await?;
        if !room.is_live() {
            return Err(LiveRoomError::Ended);
        }
        Ok(room)
    }

    async fn in_room(&self, room: &LiveRoom, user_id: i64) -> Result<bool, LiveRoomError> {
        Ok(room.host_id == user_id || self.room_repo.is_participant(room.id, user_id).await?)
    }

    async fn ensure_in_room(&self, room: &LiveRoom, user_id: i64) -> Result<(), LiveRoomError> {
        if self.in_room(room, user_id).await? {
            Ok(())
        } else {
            Err(LiveRoomError::NotParticipant)
        }
    }
}

#[async_trait]
impl<L, S> LiveRoomService for LiveRoomServiceImpl<L, S>
where
    L: LiveRoomRepository + 'static,
    S: SignalRepository + 'static,
{
    async fn create(&self, host_id: i64, title: &str) -> Result<LiveRoomDto, LiveRoomError> {
        let room = LiveRoom::new(self.id_generator.generate(), host_id, title.trim().to_string());
        let created = self.room_repo.create(&room).await.map_err(|e| match e {
            AppError::Conflict(_) => LiveRoomError::AlreadyHosting,
            e => LiveRoomError::Store(e),
        })?;

        info!(room_id = created.id, host_id, "Live room started");
        Ok(created.into())
    }

    async fn get(&self, room_id: i64) -> Result<LiveRoomDto, LiveRoomError> {
        Ok(self.load(room_id).await?.into())
    }

    async fn list_live(&self, page: Page) -> Result<Vec<LiveRoomDto>, LiveRoomError> {
        let rooms = self.room_repo.list_live(page.before, page.limit).await?;
        Ok(rooms.into_iter().map(LiveRoomDto::from).collect())
    }

    async fn join(&self, user_id: i64, room_id: i64) -> Result<LiveRoomDto, LiveRoomError> {
        self.load_live(room_id).await?;
        self.room_repo.join(room_id, user_id).await?;
        // Re-read for the refreshed participant count
        Ok(self.load(room_id).await?.into())
    }

    async fn leave(&self, user_id: i64, room_id: i64) -> Result<(), LiveRoomError> {
        let room = self.load_live(room_id).await?;
        if room.host_id == user_id {
            return Err(LiveRoomError::HostCannotLeave);
        }
        if !self.room_repo.leave(room_id, user_id).await? {
            return Err(LiveRoomError::NotParticipant);
        }
        Ok(())
    }

    async fn end(&self, user_id: i64, room_id: i64) -> Result<LiveRoomDto, LiveRoomError> {
        let room = self.load(room_id).await?;
        if room.host_id != user_id {
            return Err(LiveRoomError::NotHost);
        }

        let ended = self
            .room_repo
            .end(room_id)
            .await?
            .ok_or(LiveRoomError::Ended)?;

        info!(room_id, "Live room ended");
        Ok(ended.into())
    }

    async fn participants(&self, room_id: i64, page: Page) -> Result<Vec<UserSummaryDto>, LiveRoomError> {
        self.load(room_id).await?;
        let users = self
            .room_repo
            .participants(room_id, page.before, page.limit)
            .await?;
        Ok(users.into_iter().map(UserSummaryDto::from).collect())
    }

    async fn send_signal(
        &self,
        user_id: i64,
        room_id: i64,
        recipient_id: Option<i64>,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<SignalDto, LiveRoomError> {
        if payload.to_string().len() > MAX_SIGNAL_PAYLOAD_BYTES {
            return Err(LiveRoomError::PayloadTooLarge);
        }

        let room = self.load_live(room_id).await?;
        self.ensure_in_room(&room, user_id).await?;

        // Viewers talk to the host; only the host may broadcast
        let recipient_id = match recipient_id {
            Some(id) if id == user_id || !self.in_room(&room, id).await? => {
                return Err(LiveRoomError::InvalidRecipient);
            }
            Some(id) => Some(id),
            None if room.host_id == user_id => None,
            None => Some(room.host_id),
        };

        let signal = Signal {
            id: self.id_generator.generate(),
            channel: SignalChannel::LiveRoom,
            channel_id: room_id,
            sender_id: user_id,
            recipient_id,
            kind,
            payload,
            created_at: Utc::now(),
        };
        Ok(self.signal_repo.create(&signal).await?.into())
    }

    async fn poll_signals(
        &self,
        user_id: i64,
        room_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<SignalDto>, LiveRoomError> {
        let room = self.load(room_id).await?;
        self.ensure_in_room(&room, user_id).await?;

        let signals = self
            .signal_repo
            .poll(SignalChannel::LiveRoom, room_id, user_id, after, limit)
            .await?;
        Ok(signals.into_iter().map(SignalDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockLiveRoomRepository, MockSignalRepository};

    const HOST: i64 = 1;

    fn service(
        rooms: MockLiveRoomRepository,
        signals: MockSignalRepository,
    ) -> LiveRoomServiceImpl<MockLiveRoomRepository, MockSignalRepository> {
        LiveRoomServiceImpl::new(
            Arc::new(rooms),
            Arc::new(signals),
            Arc::new(SnowflakeGenerator::new(1, 1)),
        )
    }

    fn live_room(rooms: &mut MockLiveRoomRepository) {
        rooms
            .expect_find_by_id()
            .returning(|id| Ok(Some(LiveRoom::new(id, HOST, "Jam".into()))));
    }

    #[tokio::test]
    async fn test_second_live_room_conflicts() {
        let mut rooms = MockLiveRoomRepository::new();
        rooms
            .expect_create()
            .returning(|_| Err(AppError::Conflict("live room exists".into())));

        let err = service(rooms, MockSignalRepository::new())
            .create(HOST, "Again")
            .await
            .unwrap_err();
        assert!(matches!(err, LiveRoomError::AlreadyHosting));
    }

    #[tokio::test]
    async fn test_cannot_join_ended_room() {
        let mut rooms = MockLiveRoomRepository::new();
        rooms.expect_find_by_id().returning(|id| {
            let mut room = LiveRoom::new(id, HOST, "Jam".into());
            room.status = LiveRoomStatus::Ended;
            Ok(Some(room))
        });
        rooms.expect_join().never();

        let err = service(rooms, MockSignalRepository::new())
            .join(5, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LiveRoomError::Ended));
    }

    #[tokio::test]
    async fn test_only_host_ends() {
        let mut rooms = MockLiveRoomRepository::new();
        live_room(&mut rooms);
        rooms.expect_end().never();

        let err = service(rooms, MockSignalRepository::new())
            .end(5, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LiveRoomError::NotHost));
    }

    #[tokio::test]
    async fn test_host_broadcasts() {
        let mut rooms = MockLiveRoomRepository::new();
        live_room(&mut rooms);
        let mut signals = MockSignalRepository::new();
        signals
            .expect_create()
            .withf(|s| s.recipient_id.is_none() && s.channel == SignalChannel::LiveRoom)
            .returning(|s| Ok(s.clone()));

        let dto = service(rooms, signals)
            .send_signal(HOST, 3, None, SignalKind::Offer, serde_json::json!({"sdp": "v=0"}))
            .await
            .unwrap();
        assert_eq!(dto.recipient_id, None);
    }

    #[tokio::test]
    async fn test_viewer_signal_goes_to_host() {
        let mut rooms = MockLiveRoomRepository::new();
        live_room(&mut rooms);
        rooms.expect_is_participant().returning(|_, _| Ok(true));
        let mut signals = MockSignalRepository::new();
        signals
            .expect_create()
            .withf(|s| s.recipient_id == Some(HOST))
            .returning(|s| Ok(s.clone()));

        assert!(service(rooms, signals)
            .send_signal(5, 3, None, SignalKind::Answer, serde_json::json!({}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_outsider_cannot_poll() {
        let mut rooms = MockLiveRoomRepository::new();
        live_room(&mut rooms);
        rooms.expect_is_participant().returning(|_, _| Ok(false));

        let err = service(rooms, MockSignalRepository::new())
            .poll_signals(5, 3, None, 50)
            .await
            .unwrap_err();
        assert!(matches!(err, LiveRoomError::NotParticipant));
    }

    #[tokio::test]
    async fn test_signal_to_outsider_rejected() {
        let mut rooms = MockLiveRoomRepository::new();
        live_room(&mut rooms);
        rooms
            .expect_is_participant()
            .returning(|_, user_id| Ok(user_id == 5));
        let mut signals = MockSignalRepository::new();
        signals.expect_create().never();

        let err = service(rooms, signals)
            .send_signal(HOST, 3, Some(8), SignalKind::Offer, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LiveRoomError::InvalidRecipient));
        assert_eq!(
            AppError::from(err).status(),
            axum::http::StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn test_signal_to_self_rejected() {
        let mut rooms = MockLiveRoomRepository::new();
        live_room(&mut rooms);
        rooms.expect_is_participant().returning(|_, _| Ok(true));
        let mut signals = MockSignalRepository::new();
        signals.expect_create().never();

        let err = service(rooms, signals)
            .send_signal(5, 3, Some(5), SignalKind::IceCandidate, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LiveRoomError::InvalidRecipient));
    }

    #[tokio::test]
    async fn test_viewer_can_address_another_viewer() {
        let mut rooms = MockLiveRoomRepository::new();
        live_room(&mut rooms);
        rooms.expect_is_participant().returning(|_, _| Ok(true));
        let mut signals = MockSignalRepository::new();
        signals
            .expect_create()
            .withf(|s| s.sender_id == 5 && s.recipient_id == Some(6))
            .returning(|s| Ok(s.clone()));

        let dto = service(rooms, signals)
            .send_signal(5, 3, Some(6), SignalKind::Offer, serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(dto.recipient_id.as_deref(), Some("6"));
    }
}
