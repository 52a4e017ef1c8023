//! Follow Repository Implementation

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{FollowCounts, FollowRepository, UserSummary};
use crate::shared::error::AppError;

/// PostgreSQL follow repository implementation.
#[derive(Clone)]
pub struct PgFollowRepository {
    pool: PgPool,
}

impl PgFollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `join_column` is the side of the edge to list (`follower_id` or `followee_id`),
    /// `filter_column` the side fixed to `user_id`.
    async fn list(
        &self,
        join_column: &str,
        filter_column: &str,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        let sql = format!(
            r#"
            SELECT u.id, u.username, p.display_name, p.avatar_url
            FROM follows f
            JOIN users u ON u.id = f.{join_column}
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE f.{filter_column} = $1
              AND ($2::BIGINT IS NULL OR u.id < $2)
            ORDER BY u.id DESC
            LIMIT $3
            "#
        );
        let users = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(user_id)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }
}

#[async_trait]
impl FollowRepository for PgFollowRepository {
    async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn followers(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        self.list("follower_id", "followee_id", user_id, before, limit)
            .await
    }

    async fn following(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<UserSummary>, AppError> {
        self.list("followee_id", "follower_id", user_id, before, limit)
            .await
    }

    async fn counts(&self, user_id: i64) -> Result<FollowCounts, AppError> {
        let (followers, following): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE followee_id = $1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(FollowCounts {
            followers,
            following,
        })
    }
}
