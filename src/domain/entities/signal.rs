//! Signaling messages relayed between call and live room participants.
//!
//! Clients post signals and poll with an `after` cursor. Maps to the
//! `signals` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalChannel {
    Call,
    LiveRoom,
}

impl SignalChannel {
    pub fn from_str(s: &str) -> Self {
        match s {
            "live_room" => Self::LiveRoom,
            _ => Self::Call,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::LiveRoom => "live_room",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    Hangup,
}

impl SignalKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "answer" => Self::Answer,
            "ice_candidate" => Self::IceCandidate,
            "hangup" => Self::Hangup,
            _ => Self::Offer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice_candidate",
            Self::Hangup => "hangup",
        }
    }
}

/// A single signaling message.
///
/// `recipient_id = None` broadcasts to every other participant of the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: i64,
    pub channel: SignalChannel,
    pub channel_id: i64,
    pub sender_id: i64,
    pub recipient_id: Option<i64>,
    pub kind: SignalKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn create(&self, signal: &Signal) -> Result<Signal, AppError>;

    /// Signals addressed to `reader_id` (or broadcast) from someone else,
    /// oldest first, strictly after `after`.
    async fn poll(
        &self,
        channel: SignalChannel,
        channel_id: i64,
        reader_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Signal>, AppError>;
}
