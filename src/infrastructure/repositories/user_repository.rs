//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! Maps between the `users`/`profiles` tables and the domain User entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::like_pattern;
use crate::domain::{AccountStatus, Profile, User, UserRepository, UserRole, UserSearch};
use crate::shared::error::{conflict_on_unique, AppError};

const USER_COLUMNS: &str = r#"
    u.id, u.username, u.email, u.password_hash, u.google_sub, u.e2ee_public_key,
    u.role, u.status, u.suspended_reason, u.created_at, u.updated_at,
    p.display_name, p.bio, p.avatar_url, p.location, p.website
"#;

/// Database row for `users LEFT JOIN profiles`.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: Option<String>,
    google_sub: Option<String>,
    e2ee_public_key: Option<String>,
    role: String,
    status: String,
    suspended_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    display_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    location: Option<String>,
    website: Option<String>,
}

impl UserRow {
    /// Convert database row to domain User entity.
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            google_sub: self.google_sub,
            e2ee_public_key: self.e2ee_public_key,
            role: UserRole::from_str(&self.role),
            status: AccountStatus::from_str(&self.status),
            suspended_reason: self.suspended_reason,
            profile: Profile {
                display_name: self.display_name,
                bio: self.bio,
                avatar_url: self.avatar_url,
                location: self.location,
                website: self.website,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Change one account's status. Returns false when the user does not exist.
pub(crate) async fn update_status(
    conn: &mut PgConnection,
    id: i64,
    status: AccountStatus,
    reason: Option<&str>,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET status = $2, suspended_reason = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(reason)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Change status for many accounts. Returns the ids whose status changed.
pub(crate) async fn update_status_bulk(
    conn: &mut PgConnection,
    ids: &[i64],
    status: AccountStatus,
    reason: Option<&str>,
) -> Result<Vec<i64>, AppError> {
    let changed: Vec<i64> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET status = $2, suspended_reason = $3, updated_at = NOW()
        WHERE id = ANY($1) AND status <> $2
        RETURNING id
        "#,
    )
    .bind(ids)
    .bind(status.as_str())
    .bind(reason)
    .fetch_all(conn)
    .await?;

    Ok(changed)
}

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, predicate: &str, value: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN profiles p ON p.user_id = u.id WHERE {predicate}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserRow::into_user))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN profiles p ON p.user_id = u.id WHERE u.id = $1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_one("LOWER(u.email) = LOWER($1)", email).await
    }

    async fn find_by_google_sub(&self, sub: &str) -> Result<Option<User>, AppError> {
        self.find_one("u.google_sub = $1", sub).await
    }

    /// Create the user and its profile row in one transaction.
    async fn create(&self, user: &User) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, google_sub, role, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.google_sub)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_unique(
            "User with this email or username already exists",
        ))?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, display_name, bio, avatar_url, location, website)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.profile.display_name)
        .bind(&user.profile.bio)
        .bind(&user.profile.avatar_url)
        .bind(&user.profile.location)
        .bind(&user.profile.website)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::Internal("User vanished after insert".into()))
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET username = $2, updated_at = NOW() WHERE id = $1")
            .bind(user.id)
            .bind(&user.username)
            .execute(&mut *tx)
            .await
            .map_err(conflict_on_unique("Username already taken"))?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, display_name, bio, avatar_url, location, website)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                bio = EXCLUDED.bio,
                avatar_url = EXCLUDED.avatar_url,
                location = EXCLUDED.location,
                website = EXCLUDED.website,
                updated_at = NOW()
            "#,
        )
        .bind(user.id)
        .bind(&user.profile.display_name)
        .bind(&user.profile.bio)
        .bind(&user.profile.avatar_url)
        .bind(&user.profile.location)
        .bind(&user.profile.website)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn link_google(&self, id: i64, sub: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET google_sub = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(sub)
            .execute(&self.pool)
            .await
            .map_err(conflict_on_unique("Google account already linked"))?;

        Ok(())
    }

    async fn set_e2ee_key(&self, id: i64, public_key: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET e2ee_public_key = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(public_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn search(&self, search: &UserSearch) -> Result<Vec<User>, AppError> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u LEFT JOIN profiles p ON p.user_id = u.id
            WHERE ($1::TEXT IS NULL OR u.username ILIKE $1 OR p.display_name ILIKE $1)
              AND ($2::TEXT IS NULL OR u.status = $2)
              AND ($3::BIGINT IS NULL OR u.id < $3)
            ORDER BY u.id DESC
            LIMIT $4
            "#
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(search.query.as_deref().map(like_pattern))
            .bind(search.status.map(|s| s.as_str()))
            .bind(search.before)
            .bind(search.limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }
}
