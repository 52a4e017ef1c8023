//! Live room entity and repository trait.
//!
//! Maps to the `live_rooms` and `live_room_participants` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LiveRoomStatus {
    #[default]
    Live,
    Ended,
}

impl LiveRoomStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "ended" => Self::Ended,
            _ => Self::Live,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Ended => "ended",
        }
    }
}

/// A broadcast hosted by one user.
///
/// A partial unique index on `host_id WHERE status = 'live'` keeps one live
/// room per host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveRoom {
    pub id: i64,
    pub host_id: i64,
    pub title: String,
    pub status: LiveRoomStatus,
    pub participant_count: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl LiveRoom {
    pub fn new(id: i64, host_id: i64, title: String) -> Self {
        Self {
            id,
            host_id,
            title,
            status: LiveRoomStatus::Live,
            participant_count: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == LiveRoomStatus::Live
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveRoomRepository: Send + Sync {
    /// Conflict when the host already has a live room.
    async fn create(&self, room: &LiveRoom) -> Result<LiveRoom, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<LiveRoom>, AppError>;

    async fn list_live(&self, before: Option<i64>, limit: i64) -> Result<Vec<LiveRoom>, AppError>;

    /// Mark ended and clear participants. `None` when it was not live.
    async fn end(&self, id: i64) -> Result<Option<LiveRoom>, AppError>;

    /// Returns false when already joined.
    async fn join(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    async fn leave(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    async fn is_participant(&self, room_id: i64, user_id: i64) -> Result<bool, AppError>;

    async fn participants(
        &self,
        room_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError>;
}
