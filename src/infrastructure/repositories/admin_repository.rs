//! Admin Repository Implementation
//!
//! Moderation mutations, the audit log and dashboard aggregate counts.
//! Every mutation runs in one transaction with its audit insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool};

use super::memory_repository::soft_delete_memory;
use super::report_repository::close_report;
use super::session_repository::revoke_sessions_for_users;
use super::user_repository::{update_status, update_status_bulk};
use crate::domain::{
    AccountStatus, AdminAction, AdminAuditLog, AdminRepository, DashboardStats, Report,
    ReportStatus,
};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: i64,
    admin_id: i64,
    action: String,
    target_type: String,
    target_id: Option<i64>,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AuditLogRow {
    fn into_entry(self) -> AdminAuditLog {
        AdminAuditLog {
            id: self.id,
            admin_id: self.admin_id,
            action: AdminAction::from_str(&self.action),
            target_type: self.target_type,
            target_id: self.target_id,
            details: self.details,
            created_at: self.created_at,
        }
    }
}

/// Write one audit row on an existing transaction.
async fn insert_audit(conn: &mut PgConnection, entry: &AdminAuditLog) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO admin_audit_logs (id, admin_id, action, target_type, target_id, details)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.id)
    .bind(entry.admin_id)
    .bind(entry.action.as_str())
    .bind(&entry.target_type)
    .bind(entry.target_id)
    .bind(&entry.details)
    .execute(conn)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct PgAdminRepository {
    pool: PgPool,
}

impl PgAdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminRepository for PgAdminRepository {
    async fn suspend_user(
        &self,
        user_id: i64,
        reason: Option<String>,
        entry: &AdminAuditLog,
    ) -> Result<Option<i64>, AppError> {
        let mut tx = self.pool.begin().await?;

        if !update_status(&mut tx, user_id, AccountStatus::Suspended, reason.as_deref()).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        let revoked = revoke_sessions_for_users(&mut tx, &[user_id]).await?;
        insert_audit(&mut tx, &entry.clone().with_detail("sessions_revoked", json!(revoked))).await?;

        tx.commit().await?;

        Ok(Some(revoked))
    }

    async fn unsuspend_user(&self, user_id: i64, entry: &AdminAuditLog) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        if !update_status(&mut tx, user_id, AccountStatus::Active, None).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        insert_audit(&mut tx, entry).await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn bulk_suspend(
        &self,
        user_ids: &[i64],
        reason: Option<String>,
        entry: &AdminAuditLog,
    ) -> Result<Vec<i64>, AppError> {
        let mut tx = self.pool.begin().await?;

        let changed =
            update_status_bulk(&mut tx, user_ids, AccountStatus::Suspended, reason.as_deref()).await?;
        let revoked = if changed.is_empty() {
            0
        } else {
            revoke_sessions_for_users(&mut tx, &changed).await?
        };
        let entry = entry
            .clone()
            .with_detail(
                "suspended",
                json!(changed.iter().map(|id| id.to_string()).collect::<Vec<_>>()),
            )
            .with_detail("sessions_revoked", json!(revoked));
        insert_audit(&mut tx, &entry).await?;

        tx.commit().await?;

        Ok(changed)
    }

    async fn remove_memory(&self, memory_id: i64, entry: &AdminAuditLog) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        if !soft_delete_memory(&mut tx, memory_id).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        insert_audit(&mut tx, entry).await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn close_report(
        &self,
        report_id: i64,
        outcome: ReportStatus,
        note: Option<String>,
        entry: &AdminAuditLog,
    ) -> Result<Option<Report>, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(report) =
            close_report(&mut tx, report_id, outcome, entry.admin_id, note.as_deref()).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        insert_audit(&mut tx, entry).await?;

        tx.commit().await?;

        Ok(Some(report))
    }

    async fn audit_log(
        &self,
        admin_id: Option<i64>,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<AdminAuditLog>, AppError> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT id, admin_id, action, target_type, target_id, details, created_at
            FROM admin_audit_logs
            WHERE ($1::BIGINT IS NULL OR admin_id = $1)
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(admin_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditLogRow::into_entry).collect())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, AppError> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM users WHERE status = 'suspended') AS suspended_users,
                (SELECT COUNT(*) FROM memories WHERE deleted_at IS NULL) AS memories,
                (SELECT COUNT(*) FROM reports WHERE status = 'open') AS open_reports,
                (SELECT COUNT(*) FROM live_rooms WHERE status = 'live') AS live_rooms,
                (SELECT COUNT(*) FROM call_sessions WHERE status IN ('ringing', 'active')) AS active_calls
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
