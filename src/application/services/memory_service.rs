//! Memory Service
//!
//! Memories, feeds, comments, hearts, vault adoption and reshares.
//!
//! Visibility is decided by [`VisibilityPolicy`]; a memory the viewer may not
//! see is `Forbidden`, a missing or deleted one is `NotFound`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::services::VisibilityPolicy;
use crate::domain::{
    Comment, FeedKind, Memory, MemoryRepository, MemoryScope, Notification, NotificationKind,
    SocialGraph, VaultItem, ViewerRelation,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn create(&self, author_id: i64, input: CreateMemoryInput) -> Result<MemoryDto, MemoryError>;

    async fn get(&self, viewer_id: i64, memory_id: i64) -> Result<MemoryDto, MemoryError>;

    /// Author only. Soft delete.
    async fn delete(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError>;

    /// An author's memories, filtered to what the viewer may see.
    async fn timeline(&self, viewer_id: i64, author_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError>;

    async fn home_feed(&self, viewer_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError>;

    async fn stories(&self, viewer_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError>;

    /// Circle-scoped memories. Members only.
    async fn circle_feed(&self, viewer_id: i64, circle_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError>;

    async fn search(&self, query: &str, page: Page) -> Result<Vec<MemoryDto>, MemoryError>;

    async fn add_comment(&self, user_id: i64, memory_id: i64, body: &str) -> Result<CommentDto, MemoryError>;

    async fn list_comments(
        &self,
        viewer_id: i64,
        memory_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<CommentDto>, MemoryError>;

    /// Comment author or memory author.
    async fn delete_comment(&self, user_id: i64, comment_id: i64) -> Result<(), MemoryError>;

    async fn heart(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError>;

    async fn unheart(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError>;

    /// Save a memory into the caller's vault. Repeating is a no-op.
    async fn adopt(&self, user_id: i64, memory_id: i64, note: Option<String>) -> Result<VaultItemDto, MemoryError>;

    async fn unadopt(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError>;

    async fn vault(&self, user_id: i64, page: Page) -> Result<Vec<VaultItemDto>, MemoryError>;

    async fn reshare(&self, user_id: i64, memory_id: i64, input: ReshareInput) -> Result<MemoryDto, MemoryError>;
}

#[derive(Debug, Clone)]
pub struct CreateMemoryInput {
    pub scope: MemoryScope,
    pub body: Option<String>,
    pub media_urls: Vec<String>,
    pub circle_id: Option<i64>,
    pub recipient_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ReshareInput {
    pub body: Option<String>,
    pub scope: MemoryScope,
}

impl Default for ReshareInput {
    fn default() -> Self {
        Self {
            body: None,
            scope: MemoryScope::Public,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryDto {
    pub id: String,
    pub author_id: String,
    pub scope: MemoryScope,
    pub circle_id: Option<String>,
    pub recipient_id: Option<String>,
    pub body: Option<String>,
    pub media_urls: Vec<String>,
    pub reshare_of_id: Option<String>,
    pub comments_count: i32,
    pub hearts_count: i32,
    pub saves_count: i32,
    pub reshares_count: i32,
    pub expires_at: Option<String>,
    pub created_at: String,
}

impl From<Memory> for MemoryDto {
    fn from(memory: Memory) -> Self {
        Self {
            id: memory.id.to_string(),
            author_id: memory.author_id.to_string(),
            scope: memory.scope,
            circle_id: memory.circle_id.map(|id| id.to_string()),
            recipient_id: memory.recipient_id.map(|id| id.to_string()),
            body: memory.body,
            media_urls: memory.media_urls,
            reshare_of_id: memory.reshare_of_id.map(|id| id.to_string()),
            comments_count: memory.counters.comments,
            hearts_count: memory.counters.hearts,
            saves_count: memory.counters.saves,
            reshares_count: memory.counters.reshares,
            expires_at: memory.expires_at.map(|t| t.to_rfc3339()),
            created_at: memory.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentDto {
    pub id: String,
    pub memory_id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.to_string(),
            memory_id: comment.memory_id.to_string(),
            author_id: comment.author_id.to_string(),
            body: comment.body,
            created_at: comment.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultItemDto {
    pub id: String,
    pub memory_id: String,
    pub note: Option<String>,
    pub created_at: String,
    /// False when the memory was already in the vault.
    pub created: bool,
}

impl VaultItemDto {
    fn new(item: VaultItem, created: bool) -> Self {
        Self {
            id: item.id.to_string(),
            memory_id: item.memory_id.to_string(),
            note: item.note,
            created_at: item.created_at.to_rfc3339(),
            created,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Memory not found")]
    NotFound,

    #[error("You cannot view this memory")]
    Forbidden,

    #[error("A memory needs a body or media")]
    Empty,

    #[error("circle_id is required for circle memories")]
    CircleRequired,

    #[error("You are not a member of this circle")]
    NotCircleMember,

    #[error("recipient_id is required for direct memories")]
    RecipientRequired,

    #[error("You cannot send a direct memory to yourself")]
    SelfRecipient,

    #[error("User not found")]
    UserNotFound,

    #[error("Only the author can do this")]
    NotAuthor,

    #[error("You cannot adopt your own memory")]
    OwnMemory,

    #[error("Only public memories can be reshared")]
    NotResharable,

    #[error("Reshares must be public, followers or friends")]
    InvalidReshareScope,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("You cannot delete this comment")]
    NotCommentOwner,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<MemoryError> for AppError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::NotFound | MemoryError::UserNotFound | MemoryError::CommentNotFound => {
                AppError::NotFound(err.to_string())
            }
            MemoryError::Forbidden
            | MemoryError::NotCircleMember
            | MemoryError::NotAuthor
            | MemoryError::NotCommentOwner => AppError::Forbidden(err.to_string()),
            MemoryError::Empty => AppError::field("body", err.to_string()),
            MemoryError::CircleRequired => AppError::field("circle_id", err.to_string()),
            MemoryError::RecipientRequired | MemoryError::SelfRecipient => {
                AppError::field("recipient_id", err.to_string())
            }
            MemoryError::InvalidReshareScope => AppError::field("scope", err.to_string()),
            MemoryError::OwnMemory | MemoryError::NotResharable => {
                AppError::BadRequest(err.to_string())
            }
            MemoryError::Store(e) => e,
        }
    }
}

fn clean_body(body: Option<String>) -> Option<String> {
    body.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())
}

pub struct MemoryServiceImpl<M, G>
where
    M: MemoryRepository,
    G: SocialGraph,
{
    memory_repo: Arc<M>,
    graph: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
    story_ttl: Duration,
}

impl<M, G> MemoryServiceImpl<M, G>
where
    M: MemoryRepository,
    G: SocialGraph,
{
    pub fn new(
        memory_repo: Arc<M>,
        graph: Arc<G>,
        id_generator: Arc<SnowflakeGenerator>,
        story_ttl: Duration,
    ) -> Self {
        Self {
            memory_repo,
            graph,
            id_generator,
            story_ttl,
        }
    }

    /// Load a live memory the viewer may see.
    async fn load_visible(&self, viewer_id: i64, memory_id: i64) -> Result<Memory, MemoryError> {
        let memory = self
            .memory_repo
            .find_by_id(memory_id)
            .await?
            .filter(|m| !m.is_deleted())
            .ok_or(MemoryError::NotFound)?;

        let relation = if memory.author_id != viewer_id && VisibilityPolicy::needs_relation(memory.scope) {
            self.graph
                .relation(viewer_id, memory.author_id, memory.circle_id)
                .await?
        } else {
            ViewerRelation::default()
        };

        if !VisibilityPolicy::can_view(&memory, viewer_id, relation, Utc::now()) {
            return Err(MemoryError::Forbidden);
        }
        Ok(memory)
    }

    fn notification(
        &self,
        recipient_id: i64,
        actor_id: i64,
        kind: NotificationKind,
        memory_id: i64,
    ) -> Option<Notification> {
        (recipient_id != actor_id).then(|| {
            Notification::new(
                self.id_generator.generate(),
                recipient_id,
                actor_id,
                kind,
                Some(memory_id),
            )
        })
    }
}

fn to_dtos(memories: Vec<Memory>) -> Vec<MemoryDto> {
    memories.into_iter().map(MemoryDto::from).collect()
}

#[async_trait]
impl<M, G> MemoryService for MemoryServiceImpl<M, G>
where
    M: MemoryRepository + 'static,
    G: SocialGraph + 'static,
{
    async fn create(&self, author_id: i64, input: CreateMemoryInput) -> Result<MemoryDto, MemoryError> {
        let body = clean_body(input.body);
        if body.is_none() && input.media_urls.is_empty() {
            return Err(MemoryError::Empty);
        }

        let mut memory = Memory::new(self.id_generator.generate(), author_id, input.scope);
        memory.body = body;
        memory.media_urls = input.media_urls;

        match input.scope {
            MemoryScope::Circle => {
                let circle_id = input.circle_id.ok_or(MemoryError::CircleRequired)?;
                if !self.graph.is_circle_member(circle_id, author_id).await? {
                    return Err(MemoryError::NotCircleMember);
                }
                memory.circle_id = Some(circle_id);
            }
            MemoryScope::Direct => {
                let recipient_id = input.recipient_id.ok_or(MemoryError::RecipientRequired)?;
                if recipient_id == author_id {
                    return Err(MemoryError::SelfRecipient);
                }
                if !self.graph.user_exists(recipient_id).await? {
                    return Err(MemoryError::UserNotFound);
                }
                memory.recipient_id = Some(recipient_id);
            }
            MemoryScope::Story => {
                memory.expires_at = Some(memory.created_at + self.story_ttl);
            }
            MemoryScope::Public | MemoryScope::Private | MemoryScope::Followers | MemoryScope::Friends => {}
        }

        let created = match memory.recipient_id {
            Some(recipient_id) => {
                let notification = Notification::new(
                    self.id_generator.generate(),
                    recipient_id,
                    author_id,
                    NotificationKind::DirectMemory,
                    Some(memory.id),
                );
                self.memory_repo
                    .create_with_notification(&memory, &notification)
                    .await?
            }
            None => self.memory_repo.create(&memory).await?,
        };

        debug!(memory_id = created.id, scope = %created.scope, "Memory created");
        Ok(created.into())
    }

    async fn get(&self, viewer_id: i64, memory_id: i64) -> Result<MemoryDto, MemoryError> {
        Ok(self.load_visible(viewer_id, memory_id).await?.into())
    }

    async fn delete(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError> {
        let memory = self
            .memory_repo
            .find_by_id(memory_id)
            .await?
            .filter(|m| !m.is_deleted())
            .ok_or(MemoryError::NotFound)?;
        if memory.author_id != user_id {
            return Err(MemoryError::NotAuthor);
        }

        self.memory_repo.soft_delete(memory_id).await?;
        info!(memory_id, "Memory deleted");
        Ok(())
    }

    async fn timeline(&self, viewer_id: i64, author_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError> {
        let is_self = viewer_id == author_id;
        let relation = if is_self {
            ViewerRelation::default()
        } else {
            if !self.graph.user_exists(author_id).await? {
                return Err(MemoryError::UserNotFound);
            }
            self.graph.relation(viewer_id, author_id, None).await?
        };

        let scopes = VisibilityPolicy::timeline_scopes(is_self, relation);
        let now = Utc::now();
        let memories = self
            .memory_repo
            .list_by_author(author_id, scopes, page.before, page.limit)
            .await?;

        Ok(to_dtos(
            memories
                .into_iter()
                .filter(|m| VisibilityPolicy::can_view(m, viewer_id, relation, now))
                .collect(),
        ))
    }

    async fn home_feed(&self, viewer_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError> {
        let memories = self
            .memory_repo
            .feed(viewer_id, FeedKind::Home, page.before, page.limit)
            .await?;
        Ok(to_dtos(memories))
    }

    async fn stories(&self, viewer_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError> {
        let now = Utc::now();
        let memories = self
            .memory_repo
            .feed(viewer_id, FeedKind::Stories, page.before, page.limit)
            .await?;
        Ok(to_dtos(
            memories.into_iter().filter(|m| !m.is_expired(now)).collect(),
        ))
    }

    async fn circle_feed(&self, viewer_id: i64, circle_id: i64, page: Page) -> Result<Vec<MemoryDto>, MemoryError> {
        if !self.graph.is_circle_member(circle_id, viewer_id).await? {
            return Err(MemoryError::NotCircleMember);
        }
        let memories = self
            .memory_repo
            .list_by_circle(circle_id, page.before, page.limit)
            .await?;
        Ok(to_dtos(memories))
    }

    async fn search(&self, query: &str, page: Page) -> Result<Vec<MemoryDto>, MemoryError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let memories = self
            .memory_repo
            .search_public(query, page.before, page.limit)
            .await?;
        Ok(to_dtos(memories))
    }

    async fn add_comment(&self, user_id: i64, memory_id: i64, body: &str) -> Result<CommentDto, MemoryError> {
        let memory = self.load_visible(user_id, memory_id).await?;

        let comment = Comment {
            id: self.id_generator.generate(),
            memory_id,
            author_id: user_id,
            body: body.trim().to_string(),
            created_at: Utc::now(),
        };
        let notification = self
            .notification(memory.author_id, user_id, NotificationKind::MemoryComment, memory_id)
            .map(|n| n.with_data(serde_json::json!({ "comment_id": comment.id.to_string() })));

        let created = self.memory_repo.add_comment(&comment, notification).await?;
        Ok(created.into())
    }

    async fn list_comments(
        &self,
        viewer_id: i64,
        memory_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<CommentDto>, MemoryError> {
        self.load_visible(viewer_id, memory_id).await?;
        let comments = self
            .memory_repo
            .list_comments(memory_id, after, limit)
            .await?;
        Ok(comments.into_iter().map(CommentDto::from).collect())
    }

    async fn delete_comment(&self, user_id: i64, comment_id: i64) -> Result<(), MemoryError> {
        let comment = self
            .memory_repo
            .find_comment(comment_id)
            .await?
            .ok_or(MemoryError::CommentNotFound)?;

        if comment.author_id != user_id {
            let memory_author = self
                .memory_repo
                .find_by_id(comment.memory_id)
                .await?
                .map(|m| m.author_id);
            if memory_author != Some(user_id) {
                return Err(MemoryError::NotCommentOwner);
            }
        }

        if !self.memory_repo.delete_comment(&comment).await? {
            return Err(MemoryError::CommentNotFound);
        }
        Ok(())
    }

    async fn heart(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError> {
        let memory = self.load_visible(user_id, memory_id).await?;
        let notification =
            self.notification(memory.author_id, user_id, NotificationKind::MemoryHeart, memory_id);
        self.memory_repo
            .add_heart(memory_id, user_id, notification)
            .await?;
        Ok(())
    }

    async fn unheart(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError> {
        self.memory_repo.remove_heart(memory_id, user_id).await?;
        Ok(())
    }

    async fn adopt(&self, user_id: i64, memory_id: i64, note: Option<String>) -> Result<VaultItemDto, MemoryError> {
        let memory = self.load_visible(user_id, memory_id).await?;
        if memory.author_id == user_id {
            return Err(MemoryError::OwnMemory);
        }

        let item = VaultItem {
            id: self.id_generator.generate(),
            user_id,
            memory_id,
            note: clean_body(note),
            created_at: Utc::now(),
        };
        let notification = Notification::new(
            self.id_generator.generate(),
            memory.author_id,
            user_id,
            NotificationKind::MemoryAdopted,
            Some(memory_id),
        );

        let adoption = self.memory_repo.adopt(&item, &notification).await?;
        if adoption.created {
            info!(memory_id, user_id, "Memory adopted");
        }
        Ok(VaultItemDto::new(adoption.item, adoption.created))
    }

    async fn unadopt(&self, user_id: i64, memory_id: i64) -> Result<(), MemoryError> {
        if !self.memory_repo.unadopt(user_id, memory_id).await? {
            return Err(MemoryError::NotFound);
        }
        Ok(())
    }

    async fn vault(&self, user_id: i64, page: Page) -> Result<Vec<VaultItemDto>, MemoryError> {
        let items = self
            .memory_repo
            .list_vault(user_id, page.before, page.limit)
            .await?;
        Ok(items
            .into_iter()
            .map(|item| VaultItemDto::new(item, false))
            .collect())
    }

    async fn reshare(&self, user_id: i64, memory_id: i64, input: ReshareInput) -> Result<MemoryDto, MemoryError> {
        let original = self.load_visible(user_id, memory_id).await?;
        if original.scope != MemoryScope::Public {
            return Err(MemoryError::NotResharable);
        }
        if !input.scope.allowed_for_reshare() {
            return Err(MemoryError::InvalidReshareScope);
        }

        // Resharing a reshare points at the root memory
        let root_id = original.reshare_of_id.unwrap_or(original.id);

        let mut memory = Memory::new(self.id_generator.generate(), user_id, input.scope);
        memory.body = clean_body(input.body);
        memory.reshare_of_id = Some(root_id);

        let created = self.memory_repo.create(&memory).await?;
        Ok(created.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Adoption, MockMemoryRepository, MockSocialGraph};
    use pretty_assertions::assert_eq;

    const AUTHOR: i64 = 1;
    const VIEWER: i64 = 2;

    type Svc = MemoryServiceImpl<MockMemoryRepository, MockSocialGraph>;

    fn service(repo: MockMemoryRepository, graph: MockSocialGraph) -> Svc {
        MemoryServiceImpl::new(
            Arc::new(repo),
            Arc::new(graph),
            Arc::new(SnowflakeGenerator::new(1, 1)),
            Duration::hours(24),
        )
    }

    fn input(scope: MemoryScope) -> CreateMemoryInput {
        CreateMemoryInput {
            scope,
            body: Some("hello".into()),
            media_urls: Vec::new(),
            circle_id: None,
            recipient_id: None,
        }
    }

    fn stored(scope: MemoryScope) -> MockMemoryRepository {
        let mut repo = MockMemoryRepository::new();
        repo.expect_find_by_id()
            .returning(move |id| Ok(Some(Memory::new(id, AUTHOR, scope))));
        repo
    }

    fn relation(follows: bool, friends: bool) -> MockSocialGraph {
        let mut graph = MockSocialGraph::new();
        graph.expect_relation().returning(move |_, _, _| {
            Ok(ViewerRelation {
                follows_author: follows,
                friends_with_author: friends,
                circle_member: false,
            })
        });
        graph
    }

    #[tokio::test]
    async fn test_empty_memory_rejected() {
        let svc = service(MockMemoryRepository::new(), MockSocialGraph::new());
        let mut empty = input(MemoryScope::Public);
        empty.body = Some("   ".into());
        assert!(matches!(svc.create(AUTHOR, empty).await, Err(MemoryError::Empty)));
    }

    #[tokio::test]
    async fn test_story_gets_expiry() {
        let mut repo = MockMemoryRepository::new();
        repo.expect_create()
            .withf(|m| m.expires_at == Some(m.created_at + Duration::hours(24)))
            .returning(|m| Ok(m.clone()));

        let dto = service(repo, MockSocialGraph::new())
            .create(AUTHOR, input(MemoryScope::Story))
            .await
            .unwrap();
        assert!(dto.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_circle_memory_requires_membership() {
        let mut graph = MockSocialGraph::new();
        graph.expect_is_circle_member().returning(|_, _| Ok(false));
        let svc = service(MockMemoryRepository::new(), graph);

        assert!(matches!(
            svc.create(AUTHOR, input(MemoryScope::Circle)).await,
            Err(MemoryError::CircleRequired)
        ));

        let mut with_circle = input(MemoryScope::Circle);
        with_circle.circle_id = Some(9);
        assert!(matches!(
            svc.create(AUTHOR, with_circle).await,
            Err(MemoryError::NotCircleMember)
        ));
    }

    #[tokio::test]
    async fn test_direct_memory_notifies_recipient() {
        let mut graph = MockSocialGraph::new();
        graph.expect_user_exists().returning(|_| Ok(true));
        let mut repo = MockMemoryRepository::new();
        repo.expect_create_with_notification()
            .withf(|m, n| {
                m.recipient_id == Some(VIEWER)
                    && n.user_id == VIEWER
                    && n.kind == NotificationKind::DirectMemory
            })
            .times(1)
            .returning(|m, _| Ok(m.clone()));

        let mut direct = input(MemoryScope::Direct);
        direct.recipient_id = Some(VIEWER);
        let dto = service(repo, graph).create(AUTHOR, direct).await.unwrap();
        assert_eq!(dto.recipient_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_direct_to_self_rejected() {
        let svc = service(MockMemoryRepository::new(), MockSocialGraph::new());
        let mut direct = input(MemoryScope::Direct);
        direct.recipient_id = Some(AUTHOR);
        assert!(matches!(
            svc.create(AUTHOR, direct).await,
            Err(MemoryError::SelfRecipient)
        ));
    }

    #[tokio::test]
    async fn test_invisible_memory_is_forbidden() {
        let svc = service(stored(MemoryScope::Friends), relation(true, false));
        assert!(matches!(svc.get(VIEWER, 5).await, Err(MemoryError::Forbidden)));
    }

    #[tokio::test]
    async fn test_deleted_memory_is_not_found() {
        let mut repo = MockMemoryRepository::new();
        repo.expect_find_by_id().returning(|id| {
            let mut memory = Memory::new(id, AUTHOR, MemoryScope::Public);
            memory.deleted_at = Some(Utc::now());
            Ok(Some(memory))
        });
        let svc = service(repo, MockSocialGraph::new());
        assert!(matches!(svc.get(VIEWER, 5).await, Err(MemoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_public_memory_skips_relation_lookup() {
        let mut graph = MockSocialGraph::new();
        graph.expect_relation().never();
        let dto = service(stored(MemoryScope::Public), graph)
            .get(VIEWER, 5)
            .await
            .unwrap();
        assert_eq!(dto.id, "5");
    }

    #[tokio::test]
    async fn test_cannot_adopt_own_memory() {
        let svc = service(stored(MemoryScope::Public), MockSocialGraph::new());
        assert!(matches!(
            svc.adopt(AUTHOR, 5, None).await,
            Err(MemoryError::OwnMemory)
        ));
    }

    #[tokio::test]
    async fn test_adopt_passes_author_notification() {
        let mut repo = stored(MemoryScope::Public);
        repo.expect_adopt()
            .withf(|item, n| {
                item.user_id == VIEWER
                    && item.note.as_deref() == Some("keep")
                    && n.user_id == AUTHOR
                    && n.kind == NotificationKind::MemoryAdopted
            })
            .returning(|item, _| {
                Ok(Adoption {
                    item: item.clone(),
                    created: false,
                })
            });

        let dto = service(repo, MockSocialGraph::new())
            .adopt(VIEWER, 5, Some(" keep ".into()))
            .await
            .unwrap();
        assert!(!dto.created);
    }

    #[tokio::test]
    async fn test_reshare_requires_public_original() {
        let svc = service(stored(MemoryScope::Followers), relation(true, false));
        assert!(matches!(
            svc.reshare(VIEWER, 5, ReshareInput::default()).await,
            Err(MemoryError::NotResharable)
        ));
    }

    #[tokio::test]
    async fn test_reshare_points_at_root() {
        let mut repo = MockMemoryRepository::new();
        repo.expect_find_by_id().returning(|id| {
            let mut memory = Memory::new(id, AUTHOR, MemoryScope::Public);
            memory.reshare_of_id = Some(3);
            Ok(Some(memory))
        });
        repo.expect_create()
            .withf(|m| m.reshare_of_id == Some(3) && m.author_id == VIEWER)
            .returning(|m| Ok(m.clone()));

        let dto = service(repo, MockSocialGraph::new())
            .reshare(VIEWER, 5, ReshareInput::default())
            .await
            .unwrap();
        assert_eq!(dto.reshare_of_id.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_story_reshare_scope_rejected() {
        let svc = service(stored(MemoryScope::Public), MockSocialGraph::new());
        let input = ReshareInput {
            body: None,
            scope: MemoryScope::Story,
        };
        assert!(matches!(
            svc.reshare(VIEWER, 5, input).await,
            Err(MemoryError::InvalidReshareScope)
        ));
    }

    #[tokio::test]
    async fn test_timeline_uses_visible_scopes() {
        let mut graph = relation(true, false);
        graph.expect_user_exists().returning(|_| Ok(true));
        let mut repo = MockMemoryRepository::new();
        repo.expect_list_by_author()
            .withf(|author, scopes, _, _| {
                *author == AUTHOR
                    && scopes
                        == &vec![MemoryScope::Public, MemoryScope::Followers, MemoryScope::Story]
            })
            .returning(|_, _, _, _| Ok(vec![]));

        let memories = service(repo, graph)
            .timeline(VIEWER, AUTHOR, Page::default())
            .await
            .unwrap();
        assert!(memories.is_empty());
    }

    #[tokio::test]
    async fn test_stranger_cannot_delete_comment() {
        let mut repo = MockMemoryRepository::new();
        repo.expect_find_comment().returning(|id| {
            Ok(Some(Comment {
                id,
                memory_id: 5,
                author_id: 7,
                body: "hi".into(),
                created_at: Utc::now(),
            }))
        });
        repo.expect_find_by_id()
            .returning(|id| Ok(Some(Memory::new(id, AUTHOR, MemoryScope::Public))));
        repo.expect_delete_comment().never();

        let err = service(repo, MockSocialGraph::new())
            .delete_comment(VIEWER, 11)
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotCommentOwner));
    }

    #[tokio::test]
    async fn test_heart_on_own_memory_has_no_notification() {
        let mut repo = stored(MemoryScope::Public);
        repo.expect_add_heart()
            .withf(|_, user, n| *user == AUTHOR && n.is_none())
            .returning(|_, _, _| Ok(true));

        assert!(service(repo, MockSocialGraph::new())
            .heart(AUTHOR, 5)
            .await
            .is_ok());
    }
}
