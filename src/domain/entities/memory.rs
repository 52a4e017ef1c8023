//! Memory entity, comments, vault items and repository trait.
//!
//! Maps to the `memories`, `memory_comments`, `memory_hearts` and
//! `vault_items` tables. Engagement counters are denormalized onto the
//! memory row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::notification::Notification;
use crate::domain::value_objects::MemoryScope;
use crate::shared::error::AppError;

/// Cached engagement counts on a memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCounters {
    pub comments: i32,
    pub hearts: i32,
    pub saves: i32,
    pub reshares: i32,
}

/// A user-authored content item.
///
/// Maps to the `memories` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - scope: VARCHAR(16) CHECK (scope IN (...))
/// - circle_id: BIGINT NULL (required when scope = 'circle')
/// - recipient_id: BIGINT NULL (required when scope = 'direct')
/// - body: TEXT NULL
/// - media_urls: TEXT[] NOT NULL DEFAULT '{}'
/// - reshare_of_id: BIGINT NULL REFERENCES memories(id)
/// - comments_count / hearts_count / saves_count / reshares_count: INTEGER
/// - expires_at: TIMESTAMPTZ NULL (stories)
/// - deleted_at: TIMESTAMPTZ NULL (soft delete)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: i64,
    pub author_id: i64,
    pub scope: MemoryScope,
    pub circle_id: Option<i64>,
    pub recipient_id: Option<i64>,
    pub body: Option<String>,
    pub media_urls: Vec<String>,
    pub reshare_of_id: Option<i64>,
    pub counters: MemoryCounters,
    pub expires_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(id: i64, author_id: i64, scope: MemoryScope) -> Self {
        let now = Utc::now();
        Self {
            id,
            author_id,
            scope,
            circle_id: None,
            recipient_id: None,
            body: None,
            media_urls: Vec::new(),
            reshare_of_id: None,
            counters: MemoryCounters::default(),
            expires_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Maps to `memory_comments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub memory_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A memory saved ("adopted") into a user's vault.
///
/// Maps to `vault_items` with UNIQUE (user_id, memory_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: i64,
    pub user_id: i64,
    pub memory_id: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an adoption attempt.
#[derive(Debug, Clone)]
pub struct Adoption {
    pub item: VaultItem,
    /// False when the memory was already in the vault.
    pub created: bool,
}

/// Which memories a feed query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Own memories plus everything the viewer may see from followed users,
    /// friends, member circles and direct memories addressed to them.
    Home,
    /// Unexpired stories from the viewer, followed users and friends.
    Stories,
}

/// Result of one counter backfill batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillBatch {
    pub processed: u64,
    pub last_id: Option<i64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Insert a memory. For reshares, the original's `reshares_count` is
    /// incremented in the same transaction.
    async fn create(&self, memory: &Memory) -> Result<Memory, AppError>;

    /// Insert a memory and notify its recipient in one transaction.
    async fn create_with_notification(
        &self,
        memory: &Memory,
        notification: &Notification,
    ) -> Result<Memory, AppError>;

    /// Find by id, including soft-deleted rows.
    async fn find_by_id(&self, id: i64) -> Result<Option<Memory>, AppError>;

    /// Soft delete. Decrements the original's reshare counter for reshares.
    async fn soft_delete(&self, id: i64) -> Result<bool, AppError>;

    /// An author's live memories restricted to `scopes`.
    async fn list_by_author(
        &self,
        author_id: i64,
        scopes: Vec<MemoryScope>,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError>;

    async fn list_by_circle(
        &self,
        circle_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError>;

    async fn feed(
        &self,
        viewer_id: i64,
        kind: FeedKind,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError>;

    /// Public memories whose body matches `query`.
    async fn search_public(
        &self,
        query: &str,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Memory>, AppError>;

    /// Insert a comment and bump `comments_count`, optionally notifying.
    async fn add_comment(
        &self,
        comment: &Comment,
        notification: Option<Notification>,
    ) -> Result<Comment, AppError>;

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, AppError>;

    async fn delete_comment(&self, comment: &Comment) -> Result<bool, AppError>;

    /// Oldest first, paging forward with `after`.
    async fn list_comments(
        &self,
        memory_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Comment>, AppError>;

    /// Returns false when the heart already existed.
    async fn add_heart(
        &self,
        memory_id: i64,
        user_id: i64,
        notification: Option<Notification>,
    ) -> Result<bool, AppError>;

    async fn remove_heart(&self, memory_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Save into the vault. The vault item, the `saves_count` bump and the
    /// author notification happen once, on first adoption only.
    async fn adopt(
        &self,
        item: &VaultItem,
        notification: &Notification,
    ) -> Result<Adoption, AppError>;

    async fn unadopt(&self, user_id: i64, memory_id: i64) -> Result<bool, AppError>;

    async fn list_vault(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<VaultItem>, AppError>;

    /// Recompute all four counters for up to `batch_size` memories with
    /// `id > after_id`.
    async fn recompute_counters(
        &self,
        after_id: i64,
        batch_size: i64,
    ) -> Result<BackfillBatch, AppError>;
}
