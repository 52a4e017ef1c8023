//! Relationship lookups used by visibility and messaging checks.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{SocialGraph, UserPair, ViewerRelation};
use crate::shared::error::AppError;

#[derive(Clone)]
pub struct PgSocialGraph {
    pool: PgPool,
}

impl PgSocialGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SocialGraph for PgSocialGraph {
    async fn user_exists(&self, user_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND status = 'active')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
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

    async fn is_circle_member(&self, circle_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM circle_members WHERE circle_id = $1 AND user_id = $2)",
        )
        .bind(circle_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn relation(
        &self,
        viewer_id: i64,
        author_id: i64,
        circle_id: Option<i64>,
    ) -> Result<ViewerRelation, AppError> {
        let (follows_author, friends_with_author, circle_member): (bool, bool, bool) =
            sqlx::query_as(
                r#"
                SELECT
                    EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2),
                    EXISTS(SELECT 1 FROM friendships
                           WHERE user_low_id = LEAST($1, $2) AND user_high_id = GREATEST($1, $2)),
                    $3::BIGINT IS NOT NULL AND EXISTS(
                        SELECT 1 FROM circle_members WHERE circle_id = $3 AND user_id = $1)
                "#,
            )
            .bind(viewer_id)
            .bind(author_id)
            .bind(circle_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(ViewerRelation {
            follows_author,
            friends_with_author,
            circle_member,
        })
    }
}
