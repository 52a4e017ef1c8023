//! Memory Repository Implementation
//!
//! Memories, comments, hearts and vault items. Every engagement write
//! updates the cached counter on `memories` in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::like_pattern;
use super::notification_repository::insert_notification;
use crate::domain::{
    Adoption, BackfillBatch, Comment, FeedKind, Memory, MemoryCounters, MemoryRepository,
    MemoryScope, Notification, VaultItem,
};
use crate::shared::error::AppError;

const MEMORY_COLUMNS: &str = r#"
    m.id, m.author_id, m.scope, m.circle_id, m.recipient_id, m.body, m.media_urls,
    m.reshare_of_id, m.comments_count, m.hearts_count, m.saves_count, m.reshares_count,
    m.expires_at, m.deleted_at, m.created_at, m.updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct MemoryRow {
    id: i64,
    author_id: i64,
    scope: String,
    circle_id: Option<i64>,
    recipient_id: Option<i64>,
    body: Option<String>,
    media_urls: Vec<String>,
    reshare_of_id: Option<i64>,
    comments_count: i32,
    hearts_count: i32,
    saves_count: i32,
    reshares_count: i32,
    expires_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MemoryRow {
    fn into_memory(self) -> Result<Memory, AppError> {
        let scope = MemoryScope::parse(&self.scope).ok_or_else(|| {
            AppError::Internal(format!("Unknown memory scope '{}'", self.scope))
        })?;

        Ok(Memory {
            id: self.id,
            author_id: self.author_id,
            scope,
            circle_id: self.circle_id,
            recipient_id: self.recipient_id,
            body: self.body,
            media_urls: self.media_urls,
            reshare_of_id: self.reshare_of_id,
            counters: MemoryCounters {
                comments: self.comments_count,
                hearts: self.hearts_count,
                saves: self.saves_count,
                reshares: self.reshares_count,
            },
            expires_at: self.expires_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn into_memories(rows: Vec<MemoryRow>) -> Result<Vec<Memory>, AppError> {
    rows.into_iter().map(MemoryRow::into_memory).collect()
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    memory_id: i64,
    author_id: i64,
    body: String,
    created_at: DateTime<Utc>,
}

impl CommentRow {
    fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            memory_id: self.memory_id,
            author_id: self.author_id,
            body: self.body,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VaultItemRow {
    id: i64,
    user_id: i64,
    memory_id: i64,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl VaultItemRow {
    fn into_item(self) -> VaultItem {
        VaultItem {
            id: self.id,
            user_id: self.user_id,
            memory_id: self.memory_id,
            note: self.note,
            created_at: self.created_at,
        }
    }
}

/// Soft-delete a memory and release its hold on the original's reshare
/// counter. Returns false when it was already gone.
pub(crate) async fn soft_delete_memory(conn: &mut PgConnection, id: i64) -> Result<bool, AppError> {
    let reshare_of: Option<Option<i64>> = sqlx::query_scalar(
        r#"
        UPDATE memories SET deleted_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING reshare_of_id
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(reshare_of) = reshare_of else {
        return Ok(false);
    };

    if let Some(original_id) = reshare_of {
        sqlx::query(
            "UPDATE memories SET reshares_count = GREATEST(reshares_count - 1, 0) WHERE id = $1",
        )
        .bind(original_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(true)
}

/// PostgreSQL memory repository implementation.
#[derive(Clone)]
pub struct PgMemoryRepository {
    pool: PgPool,
}

impl PgMemoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        memory: &Memory,
        notification: Option<&Notification>,
    ) -> Result<Memory, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO memories AS m (id, author_id, scope, circle_id, recipient_id, body,
                                       media_urls, reshare_of_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MEMORY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MemoryRow>(&sql)
            .bind(memory.id)
            .bind(memory.author_id)
            .bind(memory.scope.as_str())
            .bind(memory.circle_id)
            .bind(memory.recipient_id)
            .bind(&memory.body)
            .bind(&memory.media_urls)
            .bind(memory.reshare_of_id)
            .bind(memory.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(original_id) = memory.reshare_of_id {
            sqlx::query("UPDATE memories SET reshares_count = reshares_count + 1 WHERE id = $1")
                .bind(original_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(notification) = notification {
            insert_notification(&mut tx, notification).await?;
        }

        tx.commit().await?;

        row.into_memory()
    }
}

#[async_trait]
impl MemoryRepository for PgMemoryRepository {
    async fn create(&self, memory: &Memory) -> Result<Memory, AppError> {
        self.insert(memory, None).await
    }

    async fn create_with_notification(
        &self,
        memory: &Memory,
        notification: &Notification,
    ) -> Result<Memory, AppError> {
        self.insert(memory, Some(notification)).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Memory>, AppError> {
        let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories m WHERE m.id = $1");
        let row = sqlx::query_as::<_, MemoryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MemoryRow::into_memory).transpose()
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let deleted = soft_delete_memory(&mut tx, id).await?;
        tx.commit().await?;

        Ok(deleted)
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        scopes: Vec<MemoryScope>,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError> {
        let scopes: Vec<&str> = scopes.iter().map(MemoryScope::as_str).collect();
        let sql = format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM memories m
            WHERE m.author_id = $1
              AND m.scope = ANY($2)
              AND m.deleted_at IS NULL
              AND (m.expires_at IS NULL OR m.expires_at > NOW())
              AND ($3::BIGINT IS NULL OR m.id < $3)
            ORDER BY m.id DESC
            LIMIT $4
            "#
        );
        let rows = sqlx::query_as::<_, MemoryRow>(&sql)
            .bind(author_id)
            .bind(&scopes)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        into_memories(rows)
    }

    async fn list_by_circle(
        &self,
        circle_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError> {
        let sql = format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM memories m
            WHERE m.circle_id = $1 AND m.scope = 'circle' AND m.deleted_at IS NULL
              AND ($2::BIGINT IS NULL OR m.id < $2)
            ORDER BY m.id DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, MemoryRow>(&sql)
            .bind(circle_id)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        into_memories(rows)
    }

    async fn feed(
        &self,
        viewer_id: i64,
        kind: FeedKind,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError> {
        let filter = match kind {
            FeedKind::Home => {
                r#"
                m.scope <> 'story'
                AND (
                    m.author_id = $1
                    OR (m.scope IN ('public', 'followers') AND EXISTS (
                        SELECT 1 FROM follows f WHERE f.follower_id = $1 AND f.followee_id = m.author_id))
                    OR (m.scope IN ('public', 'friends') AND EXISTS (
                        SELECT 1 FROM friendships fr
                        WHERE fr.user_low_id = LEAST($1, m.author_id)
                          AND fr.user_high_id = GREATEST($1, m.author_id)))
                    OR (m.scope = 'circle' AND EXISTS (
                        SELECT 1 FROM circle_members cm WHERE cm.circle_id = m.circle_id AND cm.user_id = $1))
                    OR (m.scope = 'direct' AND m.recipient_id = $1)
                )
                "#
            }
            FeedKind::Stories => {
                r#"
                m.scope = 'story'
                AND (
                    m.author_id = $1
                    OR EXISTS (
                        SELECT 1 FROM follows f WHERE f.follower_id = $1 AND f.followee_id = m.author_id)
                    OR EXISTS (
                        SELECT 1 FROM friendships fr
                        WHERE fr.user_low_id = LEAST($1, m.author_id)
                          AND fr.user_high_id = GREATEST($1, m.author_id))
                )
                "#
            }
        };

        let sql = format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM memories m
            WHERE m.deleted_at IS NULL
              AND (m.expires_at IS NULL OR m.expires_at > NOW())
              AND ($2::BIGINT IS NULL OR m.id < $2)
              AND {filter}
            ORDER BY m.id DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, MemoryRow>(&sql)
            .bind(viewer_id)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        into_memories(rows)
    }

    async fn search_public(
        &self,
        query: &str,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError> {
        let sql = format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM memories m
            WHERE m.scope = 'public' AND m.deleted_at IS NULL
              AND m.body ILIKE $1
              AND ($2::BIGINT IS NULL OR m.id < $2)
            ORDER BY m.id DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, MemoryRow>(&sql)
            .bind(like_pattern(query))
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        into_memories(rows)
    }

    async fn add_comment(
        &self,
        comment: &Comment,
        notification: Option<Notification>,
    ) -> Result<Comment, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO memory_comments (id, memory_id, author_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, memory_id, author_id, body, created_at
            "#,
        )
        .bind(comment.id)
        .bind(comment.memory_id)
        .bind(comment.author_id)
        .bind(&comment.body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE memories SET comments_count = comments_count + 1 WHERE id = $1")
            .bind(comment.memory_id)
            .execute(&mut *tx)
            .await?;

        if let Some(notification) = notification {
            insert_notification(&mut tx, &notification).await?;
        }

        tx.commit().await?;

        Ok(row.into_comment())
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, memory_id, author_id, body, created_at FROM memory_comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CommentRow::into_comment))
    }

    async fn delete_comment(&self, comment: &Comment) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM memory_comments WHERE id = $1")
            .bind(comment.id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE memories SET comments_count = GREATEST(comments_count - 1, 0) WHERE id = $1",
        )
        .bind(comment.memory_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn list_comments(
        &self,
        memory_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Comment>, AppError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, memory_id, author_id, body, created_at
            FROM memory_comments
            WHERE memory_id = $1 AND ($2::BIGINT IS NULL OR id > $2)
            ORDER BY id ASC
            LIMIT $3
            "#,
        )
        .bind(memory_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentRow::into_comment).collect())
    }

    async fn add_heart(
        &self,
        memory_id: i64,
        user_id: i64,
        notification: Option<Notification>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO memory_hearts (memory_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(memory_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE memories SET hearts_count = hearts_count + 1 WHERE id = $1")
            .bind(memory_id)
            .execute(&mut *tx)
            .await?;

        if let Some(notification) = notification {
            insert_notification(&mut tx, &notification).await?;
        }

        tx.commit().await?;

        Ok(true)
    }

    async fn remove_heart(&self, memory_id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM memory_hearts WHERE memory_id = $1 AND user_id = $2")
            .bind(memory_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE memories SET hearts_count = GREATEST(hearts_count - 1, 0) WHERE id = $1",
        )
        .bind(memory_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn adopt(
        &self,
        item: &VaultItem,
        notification: &Notification,
    ) -> Result<Adoption, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, VaultItemRow>(
            r#"
            INSERT INTO vault_items (id, user_id, memory_id, note)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, memory_id) DO NOTHING
            RETURNING id, user_id, memory_id, note, created_at
            "#,
        )
        .bind(item.id)
        .bind(item.user_id)
        .bind(item.memory_id)
        .bind(&item.note)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = inserted else {
            let existing = sqlx::query_as::<_, VaultItemRow>(
                r#"
                SELECT id, user_id, memory_id, note, created_at
                FROM vault_items
                WHERE user_id = $1 AND memory_id = $2
                "#,
            )
            .bind(item.user_id)
            .bind(item.memory_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;

            return Ok(Adoption {
                item: existing.into_item(),
                created: false,
            });
        };

        sqlx::query("UPDATE memories SET saves_count = saves_count + 1 WHERE id = $1")
            .bind(item.memory_id)
            .execute(&mut *tx)
            .await?;

        insert_notification(&mut tx, notification).await?;

        tx.commit().await?;

        Ok(Adoption {
            item: row.into_item(),
            created: true,
        })
    }

    async fn unadopt(&self, user_id: i64, memory_id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM vault_items WHERE user_id = $1 AND memory_id = $2")
            .bind(user_id)
            .bind(memory_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE memories SET saves_count = GREATEST(saves_count - 1, 0) WHERE id = $1")
            .bind(memory_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn list_vault(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<VaultItem>, AppError> {
        let rows = sqlx::query_as::<_, VaultItemRow>(
            r#"
            SELECT id, user_id, memory_id, note, created_at
            FROM vault_items
            WHERE user_id = $1 AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VaultItemRow::into_item).collect())
    }

    async fn recompute_counters(
        &self,
        after_id: i64,
        batch_size: i64,
    ) -> Result<BackfillBatch, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            WITH batch AS (
                SELECT id FROM memories WHERE id > $1 ORDER BY id LIMIT $2
            )
            UPDATE memories m SET
                comments_count = (SELECT COUNT(*)::INT FROM memory_comments c WHERE c.memory_id = m.id),
                hearts_count   = (SELECT COUNT(*)::INT FROM memory_hearts h WHERE h.memory_id = m.id),
                saves_count    = (SELECT COUNT(*)::INT FROM vault_items v WHERE v.memory_id = m.id),
                reshares_count = (SELECT COUNT(*)::INT FROM memories r
                                  WHERE r.reshare_of_id = m.id AND r.deleted_at IS NULL)
            FROM batch
            WHERE m.id = batch.id
            RETURNING m.id
            "#,
        )
        .bind(after_id)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(BackfillBatch {
            processed: ids.len() as u64,
            last_id: ids.into_iter().max(),
        })
    }
}
