//! Inbox Service

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{Notification, NotificationKind, NotificationRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;

#[async_trait]
pub trait InboxService: Send + Sync {
    async fn list(&self, user_id: i64, unread_only: bool, page: Page) -> Result<Vec<NotificationDto>, AppError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError>;

    /// Mark the given entries read, or every entry when `ids` is `None`.
    async fn mark_read(&self, user_id: i64, ids: Option<Vec<i64>>) -> Result<u64, AppError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationDto {
    pub id: String,
    pub kind: NotificationKind,
    pub actor_id: Option<String>,
    pub subject_id: Option<String>,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationDto {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind,
            actor_id: n.actor_id.map(|id| id.to_string()),
            subject_id: n.subject_id.map(|id| id.to_string()),
            data: n.data,
            read: n.read_at.is_some(),
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

pub struct InboxServiceImpl<N: NotificationRepository> {
    notification_repo: Arc<N>,
}

impl<N: NotificationRepository> InboxServiceImpl<N> {
    pub fn new(notification_repo: Arc<N>) -> Self {
        Self { notification_repo }
    }
}

#[async_trait]
impl<N: NotificationRepository + 'static> InboxService for InboxServiceImpl<N> {
    async fn list(&self, user_id: i64, unread_only: bool, page: Page) -> Result<Vec<NotificationDto>, AppError> {
        let entries = self
            .notification_repo
            .list(user_id, unread_only, page.before, page.limit)
            .await?;
        Ok(entries.into_iter().map(NotificationDto::from).collect())
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        self.notification_repo.unread_count(user_id).await
    }

    async fn mark_read(&self, user_id: i64, ids: Option<Vec<i64>>) -> Result<u64, AppError> {
        match ids {
            Some(ids) if ids.is_empty() => Ok(0),
            Some(ids) => self.notification_repo.mark_read(user_id, ids).await,
            None => self.notification_repo.mark_all_read(user_id).await,
        }
    }
}
