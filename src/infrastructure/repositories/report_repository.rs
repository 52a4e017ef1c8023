//! Report Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{Report, ReportReason, ReportRepository, ReportStatus, ReportTarget};
use crate::shared::error::{conflict_on_unique, AppError};

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    reporter_id: i64,
    target_type: String,
    target_id: i64,
    reason: String,
    details: Option<String>,
    status: String,
    resolution_note: Option<String>,
    resolved_by: Option<i64>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl ReportRow {
    fn into_report(self) -> Report {
        Report {
            id: self.id,
            reporter_id: self.reporter_id,
            target_type: ReportTarget::from_str(&self.target_type),
            target_id: self.target_id,
            reason: ReportReason::from_str(&self.reason),
            details: self.details,
            status: ReportStatus::from_str(&self.status),
            resolution_note: self.resolution_note,
            resolved_by: self.resolved_by,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        }
    }
}

/// Close an open report. `None` when it was not open.
pub(crate) async fn close_report(
    conn: &mut PgConnection,
    id: i64,
    status: ReportStatus,
    admin_id: i64,
    note: Option<&str>,
) -> Result<Option<Report>, AppError> {
    let row = sqlx::query_as::<_, ReportRow>(
        r#"
        UPDATE reports
        SET status = $2, resolved_by = $3, resolution_note = $4, resolved_at = NOW()
        WHERE id = $1 AND status = 'open'
        RETURNING id, reporter_id, target_type, target_id, reason, details, status,
                  resolution_note, resolved_by, created_at, resolved_at
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(admin_id)
    .bind(note)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(ReportRow::into_report))
}

/// PostgreSQL report repository implementation.
#[derive(Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn create(&self, report: &Report) -> Result<Report, AppError> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            INSERT INTO reports (id, reporter_id, target_type, target_id, reason, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, reporter_id, target_type, target_id, reason, details, status,
                      resolution_note, resolved_by, created_at, resolved_at
            "#,
        )
        .bind(report.id)
        .bind(report.reporter_id)
        .bind(report.target_type.as_str())
        .bind(report.target_id)
        .bind(report.reason.as_str())
        .bind(&report.details)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("You already have an open report on this target"))?;

        Ok(row.into_report())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Report>, AppError> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, reporter_id, target_type, target_id, reason, details, status,
                   resolution_note, resolved_by, created_at, resolved_at
            FROM reports
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ReportRow::into_report))
    }

    async fn target_exists(&self, target: ReportTarget, target_id: i64) -> Result<bool, AppError> {
        let sql = match target {
            ReportTarget::User => "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)",
            ReportTarget::Memory => {
                "SELECT EXISTS(SELECT 1 FROM memories WHERE id = $1 AND deleted_at IS NULL)"
            }
            ReportTarget::Message => {
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = $1 AND deleted_at IS NULL)"
            }
            ReportTarget::Circle => "SELECT EXISTS(SELECT 1 FROM circles WHERE id = $1)",
            ReportTarget::LiveRoom => "SELECT EXISTS(SELECT 1 FROM live_rooms WHERE id = $1)",
        };

        let exists: bool = sqlx::query_scalar(sql)
            .bind(target_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn list_by_reporter(
        &self,
        reporter_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Report>, AppError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, reporter_id, target_type, target_id, reason, details, status,
                   resolution_note, resolved_by, created_at, resolved_at
            FROM reports
            WHERE reporter_id = $1 AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(reporter_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReportRow::into_report).collect())
    }

    async fn list_by_status(
        &self,
        status: Option<ReportStatus>,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Report>, AppError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, reporter_id, target_type, target_id, reason, details, status,
                   resolution_note, resolved_by, created_at, resolved_at
            FROM reports
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReportRow::into_report).collect())
    }
}
