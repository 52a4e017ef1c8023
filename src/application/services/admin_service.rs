//! Admin Service
//!
//! Moderation actions for admin accounts. Every mutating action commits
//! together with an audit log row naming the admin, the action and its target.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::report_service::ReportDto;
use super::user_service::UserDto;
use crate::domain::{
    AccountStatus, AdminAction, AdminAuditLog, AdminRepository, DashboardStats, MemoryRepository,
    ReportRepository, ReportStatus, UserRepository, UserSearch,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

pub const MAX_BULK_SUSPEND: usize = 100;

#[async_trait]
pub trait AdminService: Send + Sync {
    async fn search_users(
        &self,
        query: Option<String>,
        status: Option<AccountStatus>,
        page: Page,
    ) -> Result<Vec<UserDto>, AdminError>;

    async fn get_user(&self, user_id: i64) -> Result<UserDto, AdminError>;

    async fn suspend(&self, admin_id: i64, user_id: i64, reason: Option<String>) -> Result<(), AdminError>;

    async fn unsuspend(&self, admin_id: i64, user_id: i64) -> Result<(), AdminError>;

    /// Returns the ids that were actually suspended.
    async fn bulk_suspend(&self, admin_id: i64, user_ids: Vec<i64>, reason: Option<String>) -> Result<Vec<i64>, AdminError>;

    async fn remove_memory(&self, admin_id: i64, memory_id: i64, reason: Option<String>) -> Result<(), AdminError>;

    async fn list_reports(&self, status: Option<ReportStatus>, page: Page) -> Result<Vec<ReportDto>, AdminError>;

    /// Close an open report as resolved or dismissed.
    async fn close_report(
        &self,
        admin_id: i64,
        report_id: i64,
        outcome: ReportStatus,
        note: Option<String>,
    ) -> Result<ReportDto, AdminError>;

    async fn dashboard(&self) -> Result<DashboardStats, AdminError>;

    async fn audit_log(&self, admin_id: Option<i64>, page: Page) -> Result<Vec<AuditLogDto>, AdminError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogDto {
    pub id: String,
    pub admin_id: String,
    pub action: AdminAction,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: String,
}

impl From<AdminAuditLog> for AuditLogDto {
    fn from(entry: AdminAuditLog) -> Self {
        Self {
            id: entry.id.to_string(),
            admin_id: entry.admin_id.to_string(),
            action: entry.action,
            target_type: entry.target_type,
            target_id: entry.target_id.map(|id| id.to_string()),
            details: entry.details,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("User not found")]
    UserNotFound,

    #[error("Memory not found")]
    MemoryNotFound,

    #[error("Report not found")]
    ReportNotFound,

    #[error("Report is already closed")]
    ReportClosed,

    #[error("Reports can only be resolved or dismissed")]
    InvalidOutcome,

    #[error("You cannot suspend yourself")]
    SelfSuspend,

    #[error("Bulk suspend takes 1 to {MAX_BULK_SUSPEND} user ids")]
    BulkSize,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::UserNotFound | AdminError::MemoryNotFound | AdminError::ReportNotFound => {
                AppError::NotFound(err.to_string())
            }
            AdminError::ReportClosed => AppError::Conflict(err.to_string()),
            AdminError::InvalidOutcome | AdminError::SelfSuspend => {
                AppError::BadRequest(err.to_string())
            }
            AdminError::BulkSize => AppError::field("user_ids", err.to_string()),
            AdminError::Store(e) => e,
        }
    }
}

pub struct AdminServiceImpl<U, M, R, A>
where
    U: UserRepository,
    M: MemoryRepository,
    R: ReportRepository,
    A: AdminRepository,
{
    user_repo: Arc<U>,
    memory_repo: Arc<M>,
    report_repo: Arc<R>,
    admin_repo: Arc<A>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<U, M, R, A> AdminServiceImpl<U, M, R, A>
where
    U: UserRepository,
    M: MemoryRepository,
    R: ReportRepository,
    A: AdminRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        memory_repo: Arc<M>,
        report_repo: Arc<R>,
        admin_repo: Arc<A>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            user_repo,
            memory_repo,
            report_repo,
            admin_repo,
            id_generator,
        }
    }

    fn entry(
        &self,
        admin_id: i64,
        action: AdminAction,
        target_type: &str,
        target_id: Option<i64>,
        details: serde_json::Value,
    ) -> AdminAuditLog {
        AdminAuditLog::new(
            self.id_generator.generate(),
            admin_id,
            action,
            target_type,
            target_id,
            details,
        )
    }
}

fn log_action(entry: &AdminAuditLog) {
    info!(
        admin_id = entry.admin_id,
        action = entry.action.as_str(),
        target_type = %entry.target_type,
        target_id = ?entry.target_id,
        "Admin action"
    );
}

#[async_trait]
impl<U, M, R, A> AdminService for AdminServiceImpl<U, M, R, A>
where
    U: UserRepository + 'static,
    M: MemoryRepository + 'static,
    R: ReportRepository + 'static,
    A: AdminRepository + 'static,
{
    async fn search_users(
        &self,
        query: Option<String>,
        status: Option<AccountStatus>,
        page: Page,
    ) -> Result<Vec<UserDto>, AdminError> {
        let users = self
            .user_repo
            .search(&UserSearch {
                query: query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
                status,
                before: page.before,
                limit: page.limit,
            })
            .await?;
        Ok(users
            .into_iter()
            .map(|u| UserDto::from_user(u, true))
            .collect())
    }

    async fn get_user(&self, user_id: i64) -> Result<UserDto, AdminError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AdminError::UserNotFound)?;
        Ok(UserDto::from_user(user, true))
    }

    async fn suspend(&self, admin_id: i64, user_id: i64, reason: Option<String>) -> Result<(), AdminError> {
        if admin_id == user_id {
            return Err(AdminError::SelfSuspend);
        }

        let entry = self.entry(
            admin_id,
            AdminAction::SuspendUser,
            "user",
            Some(user_id),
            json!({ "reason": reason }),
        );
        self.admin_repo
            .suspend_user(user_id, reason, &entry)
            .await?
            .ok_or(AdminError::UserNotFound)?;

        log_action(&entry);
        Ok(())
    }

    async fn unsuspend(&self, admin_id: i64, user_id: i64) -> Result<(), AdminError> {
        let entry = self.entry(admin_id, AdminAction::UnsuspendUser, "user", Some(user_id), json!({}));
        if !self.admin_repo.unsuspend_user(user_id, &entry).await? {
            return Err(AdminError::UserNotFound);
        }

        log_action(&entry);
        Ok(())
    }

    async fn bulk_suspend(&self, admin_id: i64, user_ids: Vec<i64>, reason: Option<String>) -> Result<Vec<i64>, AdminError> {
        let mut ids = user_ids;
        ids.sort_unstable();
        ids.dedup();
        ids.retain(|id| *id != admin_id);
        if ids.is_empty() || ids.len() > MAX_BULK_SUSPEND {
            return Err(AdminError::BulkSize);
        }

        let entry = self.entry(
            admin_id,
            AdminAction::BulkSuspendUsers,
            "user",
            None,
            json!({
                "reason": reason,
                "requested": ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            }),
        );
        let changed = self.admin_repo.bulk_suspend(&ids, reason, &entry).await?;

        log_action(&entry);
        Ok(changed)
    }

    async fn remove_memory(&self, admin_id: i64, memory_id: i64, reason: Option<String>) -> Result<(), AdminError> {
        let memory = self
            .memory_repo
            .find_by_id(memory_id)
            .await?
            .filter(|m| !m.is_deleted())
            .ok_or(AdminError::MemoryNotFound)?;

        let entry = self.entry(
            admin_id,
            AdminAction::RemoveMemory,
            "memory",
            Some(memory_id),
            json!({ "reason": reason, "author_id": memory.author_id.to_string() }),
        );
        if !self.admin_repo.remove_memory(memory_id, &entry).await? {
            return Err(AdminError::MemoryNotFound);
        }

        log_action(&entry);
        Ok(())
    }

    async fn list_reports(&self, status: Option<ReportStatus>, page: Page) -> Result<Vec<ReportDto>, AdminError> {
        let reports = self
            .report_repo
            .list_by_status(status, page.before, page.limit)
            .await?;
        Ok(reports.into_iter().map(ReportDto::from).collect())
    }

    async fn close_report(
        &self,
        admin_id: i64,
        report_id: i64,
        outcome: ReportStatus,
        note: Option<String>,
    ) -> Result<ReportDto, AdminError> {
        let action = match outcome {
            ReportStatus::Resolved => AdminAction::ResolveReport,
            ReportStatus::Dismissed => AdminAction::DismissReport,
            ReportStatus::Open => return Err(AdminError::InvalidOutcome),
        };

        self.report_repo
            .find_by_id(report_id)
            .await?
            .ok_or(AdminError::ReportNotFound)?;

        let entry = self.entry(admin_id, action, "report", Some(report_id), json!({ "note": note }));
        let closed = self
            .admin_repo
            .close_report(report_id, outcome, note, &entry)
            .await?
            .ok_or(AdminError::ReportClosed)?;

        log_action(&entry);
        Ok(closed.into())
    }

    async fn dashboard(&self) -> Result<DashboardStats, AdminError> {
        Ok(self.admin_repo.dashboard_stats().await?)
    }

    async fn audit_log(&self, admin_id: Option<i64>, page: Page) -> Result<Vec<AuditLogDto>, AdminError> {
        let entries = self
            .admin_repo
            .audit_log(admin_id, page.before, page.limit)
            .await?;
        Ok(entries.into_iter().map(AuditLogDto::from).collect())
    }
}
