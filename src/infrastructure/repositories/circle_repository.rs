//! Circle Repository Implementation
//!
//! Circles and their membership. `member_count` is kept in step with
//! `circle_members` inside the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Circle, CircleMember, CircleMemberProfile, CircleRepository, CircleRole};
use crate::shared::error::{conflict_on_unique, AppError};

#[derive(Debug, sqlx::FromRow)]
struct CircleRow {
    id: i64,
    owner_id: i64,
    name: String,
    description: Option<String>,
    member_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CircleRow {
    fn into_circle(self) -> Circle {
        Circle {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            member_count: self.member_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    circle_id: i64,
    user_id: i64,
    role: String,
    joined_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_member(self) -> CircleMember {
        CircleMember {
            circle_id: self.circle_id,
            user_id: self.user_id,
            role: CircleRole::from_str(&self.role),
            joined_at: self.joined_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberProfileRow {
    user_id: i64,
    username: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    role: String,
    joined_at: DateTime<Utc>,
}

impl MemberProfileRow {
    fn into_profile(self) -> CircleMemberProfile {
        CircleMemberProfile {
            user_id: self.user_id,
            username: self.username,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            role: CircleRole::from_str(&self.role),
            joined_at: self.joined_at,
        }
    }
}

/// PostgreSQL circle repository implementation.
#[derive(Clone)]
pub struct PgCircleRepository {
    pool: PgPool,
}

impl PgCircleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CircleRepository for PgCircleRepository {
    async fn create(&self, circle: &Circle) -> Result<Circle, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CircleRow>(
            r#"
            INSERT INTO circles (id, owner_id, name, description, member_count)
            VALUES ($1, $2, $3, $4, 1)
            RETURNING id, owner_id, name, description, member_count, created_at, updated_at
            "#,
        )
        .bind(circle.id)
        .bind(circle.owner_id)
        .bind(&circle.name)
        .bind(&circle.description)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO circle_members (circle_id, user_id, role) VALUES ($1, $2, 'owner')",
        )
        .bind(circle.id)
        .bind(circle.owner_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into_circle())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Circle>, AppError> {
        let row = sqlx::query_as::<_, CircleRow>(
            r#"
            SELECT id, owner_id, name, description, member_count, created_at, updated_at
            FROM circles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CircleRow::into_circle))
    }

    async fn update(&self, circle: &Circle) -> Result<Circle, AppError> {
        let row = sqlx::query_as::<_, CircleRow>(
            r#"
            UPDATE circles
            SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, name, description, member_count, created_at, updated_at
            "#,
        )
        .bind(circle.id)
        .bind(&circle.name)
        .bind(&circle.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Circle not found".into()))?;

        Ok(row.into_circle())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM circles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_member(
        &self,
        circle_id: i64,
        user_id: i64,
    ) -> Result<Option<CircleMember>, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT circle_id, user_id, role, joined_at
            FROM circle_members
            WHERE circle_id = $1 AND user_id = $2
            "#,
        )
        .bind(circle_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MemberRow::into_member))
    }

    async fn add_member(&self, member: &CircleMember) -> Result<CircleMember, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO circle_members (circle_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING circle_id, user_id, role, joined_at
            "#,
        )
        .bind(member.circle_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique("User is already a member of this circle"))?;

        sqlx::query("UPDATE circles SET member_count = member_count + 1 WHERE id = $1")
            .bind(member.circle_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into_member())
    }

    async fn remove_member(&self, circle_id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM circle_members WHERE circle_id = $1 AND user_id = $2")
            .bind(circle_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if removed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE circles SET member_count = GREATEST(member_count - 1, 0) WHERE id = $1",
        )
        .bind(circle_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn list_members(
        &self,
        circle_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<CircleMemberProfile>, AppError> {
        let rows = sqlx::query_as::<_, MemberProfileRow>(
            r#"
            SELECT u.id AS user_id, u.username, p.display_name, p.avatar_url, m.role, m.joined_at
            FROM circle_members m
            JOIN users u ON u.id = m.user_id
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE m.circle_id = $1
              AND ($2::BIGINT IS NULL OR u.id < $2)
            ORDER BY u.id DESC
            LIMIT $3
            "#,
        )
        .bind(circle_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MemberProfileRow::into_profile).collect())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Circle>, AppError> {
        let rows = sqlx::query_as::<_, CircleRow>(
            r#"
            SELECT c.id, c.owner_id, c.name, c.description, c.member_count, c.created_at, c.updated_at
            FROM circles c
            JOIN circle_members m ON m.circle_id = c.id
            WHERE m.user_id = $1
            ORDER BY c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CircleRow::into_circle).collect())
    }
}
