//! Call session entity, status machine and repository trait.
//!
//! Maps to the `call_sessions` table. Media never touches the server; the
//! session only tracks who is calling whom and relays signals.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    #[default]
    Audio,
    Video,
}

impl CallKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "video" => Self::Video,
            _ => Self::Audio,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// ```text
/// ringing -> active | declined | cancelled | missed
/// active  -> ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    #[default]
    Ringing,
    Active,
    Ended,
    Declined,
    Cancelled,
    Missed,
}

impl CallStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "ended" => Self::Ended,
            "declined" => Self::Declined,
            "cancelled" => Self::Cancelled,
            "missed" => Self::Missed,
            _ => Self::Ringing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
            Self::Missed => "missed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ringing | Self::Active)
    }

    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        use CallStatus::*;
        matches!(
            (self, next),
            (Ringing, Active) | (Ringing, Declined) | (Ringing, Cancelled) | (Ringing, Missed)
                | (Active, Ended)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub id: i64,
    pub caller_id: i64,
    pub callee_id: i64,
    pub kind: CallKind,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallSession {
    pub fn new(id: i64, caller_id: i64, callee_id: i64, kind: CallKind) -> Self {
        Self {
            id,
            caller_id,
            callee_id,
            kind,
            status: CallStatus::Ringing,
            created_at: Utc::now(),
            answered_at: None,
            ended_at: None,
        }
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.caller_id == user_id || self.callee_id == user_id
    }

    pub fn peer_of(&self, user_id: i64) -> i64 {
        if self.caller_id == user_id {
            self.callee_id
        } else {
            self.caller_id
        }
    }

    /// A ringing call nobody answered within `ring_timeout`.
    pub fn ring_expired(&self, now: DateTime<Utc>, ring_timeout: Duration) -> bool {
        self.status == CallStatus::Ringing && now - self.created_at >= ring_timeout
    }
}

/// Outcome of trying to open a call.
#[derive(Debug, Clone)]
pub enum CallStart {
    Started(CallSession),
    /// The caller already has a ringing or active call.
    CallerBusy,
    /// The callee already has a ringing or active call.
    CalleeBusy,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Insert a ringing call unless either participant already has a ringing
    /// or active call. Both participants stay locked from the check to the
    /// insert, so concurrent starts involving the same user serialize.
    async fn start_if_idle(&self, call: &CallSession) -> Result<CallStart, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<CallSession>, AppError>;

    /// Compare-and-set the status. Returns `None` when the row was no longer
    /// in `from` (someone else moved it first).
    async fn transition(
        &self,
        id: i64,
        from: CallStatus,
        to: CallStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CallSession>, AppError>;

    /// Flip every ringing call created before `cutoff` to missed.
    async fn expire_ringing(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;

    async fn incoming_ringing(&self, callee_id: i64) -> Result<Vec<CallSession>, AppError>;

    async fn history(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<CallSession>, AppError>;
}
