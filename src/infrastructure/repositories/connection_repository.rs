//! Connection Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::notification_repository::insert_notification;
use crate::domain::{
    Connection, ConnectionRepository, ConnectionStatus, Notification, UserPair, UserSummary,
};
use crate::shared::error::{conflict_on_unique, AppError};

#[derive(Debug, sqlx::FromRow)]
struct ConnectionRow {
    user_low_id: i64,
    user_high_id: i64,
    requested_by: i64,
    status: String,
    created_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
}

impl ConnectionRow {
    fn into_connection(self) -> Connection {
        Connection {
            user_low_id: self.user_low_id,
            user_high_id: self.user_high_id,
            requested_by: self.requested_by,
            status: ConnectionStatus::from_str(&self.status),
            created_at: self.created_at,
            accepted_at: self.accepted_at,
        }
    }
}

/// PostgreSQL connection repository implementation.
#[derive(Clone)]
pub struct PgConnectionRepository {
    pool: PgPool,
}

impl PgConnectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionRepository for PgConnectionRepository {
    async fn find(&self, pair: UserPair) -> Result<Option<Connection>, AppError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            r#"
            SELECT user_low_id, user_high_id, requested_by, status, created_at, accepted_at
            FROM connections
            WHERE user_low_id = $1 AND user_high_id = $2
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConnectionRow::into_connection))
    }

    async fn create_pending(
        &self,
        pair: UserPair,
        requested_by: i64,
    ) -> Result<Connection, AppError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            r#"
            INSERT INTO connections (user_low_id, user_high_id, requested_by, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING user_low_id, user_high_id, requested_by, status, created_at, accepted_at
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .bind(requested_by)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("Connection already exists"))?;

        Ok(row.into_connection())
    }

    async fn accept(
        &self,
        pair: UserPair,
        notification: &Notification,
    ) -> Result<Option<Connection>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ConnectionRow>(
            r#"
            UPDATE connections
            SET status = 'accepted', accepted_at = NOW()
            WHERE user_low_id = $1 AND user_high_id = $2 AND status = 'pending'
            RETURNING user_low_id, user_high_id, requested_by, status, created_at, accepted_at
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        insert_notification(&mut tx, notification).await?;

        tx.commit().await?;

        Ok(Some(row.into_connection()))
    }

    async fn delete(&self, pair: UserPair) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM connections WHERE user_low_id = $1 AND user_high_id = $2")
                .bind(pair.low())
                .bind(pair.high())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_accepted(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, p.display_name, p.avatar_url
            FROM connections c
            JOIN users u
              ON u.id = CASE WHEN c.user_low_id = $1 THEN c.user_high_id ELSE c.user_low_id END
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE (c.user_low_id = $1 OR c.user_high_id = $1)
              AND c.status = 'accepted'
              AND ($2::BIGINT IS NULL OR u.id < $2)
            ORDER BY u.id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn list_incoming(&self, user_id: i64, limit: i64) -> Result<Vec<Connection>, AppError> {
        let rows = sqlx::query_as::<_, ConnectionRow>(
            r#"
            SELECT user_low_id, user_high_id, requested_by, status, created_at, accepted_at
            FROM connections
            WHERE (user_low_id = $1 OR user_high_id = $1)
              AND status = 'pending' AND requested_by <> $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ConnectionRow::into_connection).collect())
    }
}
