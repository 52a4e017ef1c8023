//! Admin audit log and dashboard statistics.
//!
//! Maps to the `admin_audit_logs` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::{Report, ReportStatus};
use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    SuspendUser,
    UnsuspendUser,
    BulkSuspendUsers,
    RemoveMemory,
    ResolveReport,
    DismissReport,
}

impl AdminAction {
    pub fn from_str(s: &str) -> Self {
        match s {
            "unsuspend_user" => Self::UnsuspendUser,
            "bulk_suspend_users" => Self::BulkSuspendUsers,
            "remove_memory" => Self::RemoveMemory,
            "resolve_report" => Self::ResolveReport,
            "dismiss_report" => Self::DismissReport,
            _ => Self::SuspendUser,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuspendUser => "suspend_user",
            Self::UnsuspendUser => "unsuspend_user",
            Self::BulkSuspendUsers => "bulk_suspend_users",
            Self::RemoveMemory => "remove_memory",
            Self::ResolveReport => "resolve_report",
            Self::DismissReport => "dismiss_report",
        }
    }
}

/// One row per mutating admin action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAuditLog {
    pub id: i64,
    pub admin_id: i64,
    pub action: AdminAction,
    pub target_type: String,
    pub target_id: Option<i64>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AdminAuditLog {
    pub fn new(
        id: i64,
        admin_id: i64,
        action: AdminAction,
        target_type: &str,
        target_id: Option<i64>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id,
            admin_id,
            action,
            target_type: target_type.to_string(),
            target_id,
            details,
            created_at: Utc::now(),
        }
    }

    /// Add one key to the details object, replacing a non-object payload.
    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        if !self.details.is_object() {
            self.details = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(details) = self.details.as_object_mut() {
            details.insert(key.to_string(), value);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DashboardStats {
    pub users: i64,
    pub suspended_users: i64,
    pub memories: i64,
    pub open_reports: i64,
    pub live_rooms: i64,
    pub active_calls: i64,
}

/// Each mutation commits together with its audit entry or not at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminRepository: Send + Sync {
    /// Suspend a user and revoke their sessions. Returns the number of
    /// sessions revoked, or `None` when the user does not exist.
    async fn suspend_user(
        &self,
        user_id: i64,
        reason: Option<String>,
        entry: &AdminAuditLog,
    ) -> Result<Option<i64>, AppError>;

    /// Returns false when the user does not exist.
    async fn unsuspend_user(&self, user_id: i64, entry: &AdminAuditLog) -> Result<bool, AppError>;

    /// Suspend every active user in `user_ids`. Returns the ids that changed.
    async fn bulk_suspend(
        &self,
        user_ids: &[i64],
        reason: Option<String>,
        entry: &AdminAuditLog,
    ) -> Result<Vec<i64>, AppError>;

    /// Returns false when the memory was already deleted.
    async fn remove_memory(&self, memory_id: i64, entry: &AdminAuditLog) -> Result<bool, AppError>;

    /// `None` when the report was not open.
    async fn close_report(
        &self,
        report_id: i64,
        outcome: ReportStatus,
        note: Option<String>,
        entry: &AdminAuditLog,
    ) -> Result<Option<Report>, AppError>;

    async fn audit_log(
        &self,
        admin_id: Option<i64>,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<AdminAuditLog>, AppError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, AppError>;
}
