//! Notification Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{Notification, NotificationKind, NotificationRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    user_id: i64,
    actor_id: Option<i64>,
    kind: String,
    subject_id: Option<i64>,
    data: serde_json::Value,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    /// Rows with a kind this build does not know are skipped.
    fn into_notification(self) -> Option<Notification> {
        Some(Notification {
            id: self.id,
            user_id: self.user_id,
            actor_id: self.actor_id,
            kind: NotificationKind::parse(&self.kind)?,
            subject_id: self.subject_id,
            data: self.data,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

/// Insert a notification on an existing connection or transaction.
pub(crate) async fn insert_notification(
    conn: &mut PgConnection,
    notification: &Notification,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, actor_id, kind, subject_id, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(notification.actor_id)
    .bind(notification.kind.as_str())
    .bind(notification.subject_id)
    .bind(&notification.data)
    .execute(conn)
    .await?;

    Ok(())
}

/// PostgreSQL notification repository implementation.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_notification(&mut conn, notification).await?;

        Ok(notification.clone())
    }

    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, actor_id, kind, subject_id, data, read_at, created_at
            FROM notifications
            WHERE user_id = $1
              AND (NOT $2 OR read_at IS NULL)
              AND ($3::BIGINT IS NULL OR id < $3)
            ORDER BY id DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(NotificationRow::into_notification)
            .collect())
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, user_id: i64, ids: Vec<i64>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET read_at = NOW()
            WHERE user_id = $1 AND id = ANY($2) AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(&ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
