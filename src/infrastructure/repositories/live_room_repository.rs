//! Live Room Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{LiveRoom, LiveRoomRepository, LiveRoomStatus, UserSummary};
use crate::shared::error::{conflict_on_unique, AppError};

#[derive(Debug, sqlx::FromRow)]
struct LiveRoomRow {
    id: i64,
    host_id: i64,
    title: String,
    status: String,
    participant_count: i32,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl LiveRoomRow {
    fn into_room(self) -> LiveRoom {
        LiveRoom {
            id: self.id,
            host_id: self.host_id,
            title: self.title,
            status: LiveRoomStatus::from_str(&self.status),
            participant_count: self.participant_count,
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// PostgreSQL live room repository implementation.
#[derive(Clone)]
pub struct PgLiveRoomRepository {
    pool: PgPool,
}

impl PgLiveRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LiveRoomRepository for PgLiveRoomRepository {
    async fn create(&self, room: &LiveRoom) -> Result<LiveRoom, AppError> {
        let row = sqlx::query_as::<_, LiveRoomRow>(
            r#"
            INSERT INTO live_rooms (id, host_id, title, status)
            VALUES ($1, $2, $3, 'live')
            RETURNING id, host_id, title, status, participant_count, started_at, ended_at
            "#,
        )
        .bind(room.id)
        .bind(room.host_id)
        .bind(&room.title)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("You already have a live room"))?;

        Ok(row.into_room())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<LiveRoom>, AppError> {
        let row = sqlx::query_as::<_, LiveRoomRow>(
            r#"
            SELECT id, host_id, title, status, participant_count, started_at, ended_at
            FROM live_rooms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LiveRoomRow::into_room))
    }

    async fn list_live(&self, before: Option<i64>, limit: i64) -> Result<Vec<LiveRoom>, AppError> {
        let rows = sqlx::query_as::<_, LiveRoomRow>(
            r#"
            SELECT id, host_id, title, status, participant_count, started_at, ended_at
            FROM live_rooms
            WHERE status = 'live' AND ($1::BIGINT IS NULL OR id < $1)
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LiveRoomRow::into_room).collect())
    }

    async fn end(&self, id: i64) -> Result<Option<LiveRoom>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LiveRoomRow>(
            r#"
            UPDATE live_rooms
            SET status = 'ended', ended_at = NOW(), participant_count = 0
            WHERE id = $1 AND status = 'live'
            RETURNING id, host_id, title, status, participant_count, started_at, ended_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_some() {
            sqlx::query("DELETE FROM live_room_participants WHERE room_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(row.map(LiveRoomRow::into_room))
    }

    async fn join(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO live_room_participants (room_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE live_rooms SET participant_count = participant_count + 1 WHERE id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn leave(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted =
            sqlx::query("DELETE FROM live_room_participants WHERE room_id = $1 AND user_id = $2")
                .bind(room_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE live_rooms SET participant_count = GREATEST(participant_count - 1, 0) WHERE id = $1",
        )
        .bind(room_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn is_participant(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM live_room_participants WHERE room_id = $1 AND user_id = $2)",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn participants(
        &self,
        room_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, p.display_name, p.avatar_url
            FROM live_room_participants lp
            JOIN users u ON u.id = lp.user_id
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE lp.room_id = $1 AND ($2::BIGINT IS NULL OR u.id < $2)
            ORDER BY u.id DESC
            LIMIT $3
            "#,
        )
        .bind(room_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
