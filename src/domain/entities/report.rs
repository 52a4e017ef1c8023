//! Safety report entity and repository trait.
//!
//! Maps to the `reports` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    User,
    Memory,
    Message,
    Circle,
    LiveRoom,
}

impl ReportTarget {
    pub fn from_str(s: &str) -> Self {
        match s {
            "memory" => Self::Memory,
            "message" => Self::Message,
            "circle" => Self::Circle,
            "live_room" => Self::LiveRoom,
            _ => Self::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Memory => "memory",
            Self::Message => "message",
            Self::Circle => "circle",
            Self::LiveRoom => "live_room",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Harassment,
    Nudity,
    Violence,
    HateSpeech,
    SelfHarm,
    Impersonation,
    Other,
}

impl ReportReason {
    pub fn from_str(s: &str) -> Self {
        match s {
            "spam" => Self::Spam,
            "harassment" => Self::Harassment,
            "nudity" => Self::Nudity,
            "violence" => Self::Violence,
            "hate_speech" => Self::HateSpeech,
            "self_harm" => Self::SelfHarm,
            "impersonation" => Self::Impersonation,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Harassment => "harassment",
            Self::Nudity => "nudity",
            Self::Violence => "violence",
            Self::HateSpeech => "hate_speech",
            Self::SelfHarm => "self_harm",
            Self::Impersonation => "impersonation",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Open,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "resolved" => Self::Resolved,
            "dismissed" => Self::Dismissed,
            _ => Self::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

/// A partial unique index on `(reporter_id, target_type, target_id)
/// WHERE status = 'open'` rejects duplicate open reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub target_type: ReportTarget,
    pub target_id: i64,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn new(
        id: i64,
        reporter_id: i64,
        target_type: ReportTarget,
        target_id: i64,
        reason: ReportReason,
        details: Option<String>,
    ) -> Self {
        Self {
            id,
            reporter_id,
            target_type,
            target_id,
            reason,
            details,
            status: ReportStatus::Open,
            resolution_note: None,
            resolved_by: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Conflict when the reporter already has an open report on the target.
    async fn create(&self, report: &Report) -> Result<Report, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Report>, AppError>;

    /// Whether the reported object exists (and is not deleted).
    async fn target_exists(&self, target: ReportTarget, target_id: i64) -> Result<bool, AppError>;

    async fn list_by_reporter(
        &self,
        reporter_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Report>, AppError>;

    async fn list_by_status(
        &self,
        status: Option<ReportStatus>,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Report>, AppError>;
}
