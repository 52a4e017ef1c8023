//! Friendship Repository Implementation
//!
//! Friend requests and the canonical `friendships` pair rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::notification_repository::insert_notification;
use crate::domain::{
    FriendRequest, FriendRequestStatus, Friendship, FriendshipRepository, Notification, UserPair,
    UserSummary,
};
use crate::shared::error::{conflict_on_unique, AppError};

#[derive(Debug, sqlx::FromRow)]
struct FriendRequestRow {
    id: i64,
    sender_id: i64,
    recipient_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl FriendRequestRow {
    fn into_request(self) -> FriendRequest {
        FriendRequest {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            status: FriendRequestStatus::from_str(&self.status),
            created_at: self.created_at,
            responded_at: self.responded_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FriendshipRow {
    user_low_id: i64,
    user_high_id: i64,
    created_at: DateTime<Utc>,
}

impl FriendshipRow {
    fn into_friendship(self) -> Friendship {
        Friendship {
            user_low_id: self.user_low_id,
            user_high_id: self.user_high_id,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL friendship repository implementation.
#[derive(Clone)]
pub struct PgFriendshipRepository {
    pool: PgPool,
}

impl PgFriendshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn pending_for(
        &self,
        column: &str,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<FriendRequest>, AppError> {
        let sql = format!(
            r#"
            SELECT id, sender_id, recipient_id, status, created_at, responded_at
            FROM friend_requests
            WHERE {column} = $1 AND status = 'pending'
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, FriendRequestRow>(&sql)
            .bind(user_id)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(FriendRequestRow::into_request).collect())
    }
}

#[async_trait]
impl FriendshipRepository for PgFriendshipRepository {
    async fn find_request(&self, id: i64) -> Result<Option<FriendRequest>, AppError> {
        let row = sqlx::query_as::<_, FriendRequestRow>(
            r#"
            SELECT id, sender_id, recipient_id, status, created_at, responded_at
            FROM friend_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FriendRequestRow::into_request))
    }

    async fn find_pending(
        &self,
        sender_id: i64,
        recipient_id: i64,
    ) -> Result<Option<FriendRequest>, AppError> {
        let row = sqlx::query_as::<_, FriendRequestRow>(
            r#"
            SELECT id, sender_id, recipient_id, status, created_at, responded_at
            FROM friend_requests
            WHERE sender_id = $1 AND recipient_id = $2 AND status = 'pending'
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FriendRequestRow::into_request))
    }

    async fn create_request(&self, request: &FriendRequest) -> Result<FriendRequest, AppError> {
        let row = sqlx::query_as::<_, FriendRequestRow>(
            r#"
            INSERT INTO friend_requests (id, sender_id, recipient_id, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING id, sender_id, recipient_id, status, created_at, responded_at
            "#,
        )
        .bind(request.id)
        .bind(request.sender_id)
        .bind(request.recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("Friend request already pending"))?;

        Ok(row.into_request())
    }

    async fn accept_request(
        &self,
        request_id: i64,
        pair: UserPair,
        notification: &Notification,
    ) -> Result<Option<Friendship>, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE friend_requests
            SET status = 'accepted', responded_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // A concurrent accept in the other direction may have created the row already.
        sqlx::query(
            r#"
            INSERT INTO friendships (user_low_id, user_high_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .execute(&mut *tx)
        .await?;

        // Any pending request in the opposite direction is now moot.
        sqlx::query(
            r#"
            UPDATE friend_requests
            SET status = 'accepted', responded_at = NOW()
            WHERE status = 'pending' AND id <> $1
              AND LEAST(sender_id, recipient_id) = $2
              AND GREATEST(sender_id, recipient_id) = $3
            "#,
        )
        .bind(request_id)
        .bind(pair.low())
        .bind(pair.high())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, FriendshipRow>(
            r#"
            SELECT user_low_id, user_high_id, created_at
            FROM friendships
            WHERE user_low_id = $1 AND user_high_id = $2
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(&mut *tx)
        .await?;

        insert_notification(&mut tx, notification).await?;

        tx.commit().await?;

        Ok(Some(row.into_friendship()))
    }

    async fn close_request(
        &self,
        request_id: i64,
        status: FriendRequestStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE friend_requests
            SET status = $2, responded_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn are_friends(&self, pair: UserPair) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_low_id = $1 AND user_high_id = $2)",
        )
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn delete_friendship(&self, pair: UserPair) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM friendships WHERE user_low_id = $1 AND user_high_id = $2")
                .bind(pair.low())
                .bind(pair.high())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_friends(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, p.display_name, p.avatar_url
            FROM friendships f
            JOIN users u
              ON u.id = CASE WHEN f.user_low_id = $1 THEN f.user_high_id ELSE f.user_low_id END
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE (f.user_low_id = $1 OR f.user_high_id = $1)
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

    async fn incoming_requests(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<FriendRequest>, AppError> {
        self.pending_for("recipient_id", user_id, before, limit).await
    }

    async fn outgoing_requests(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<FriendRequest>, AppError> {
        self.pending_for("sender_id", user_id, before, limit).await
    }
}
