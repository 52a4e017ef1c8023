//! Circle Service
//!
//! Circle lifecycle and membership. Only the owner manages members; any
//! member except the owner may leave.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::domain::{
    Circle, CircleMember, CircleMemberProfile, CircleRepository, CircleRole, Notification,
    NotificationKind, NotificationRepository, SocialGraph,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait CircleService: Send + Sync {
    async fn create(&self, owner_id: i64, input: CircleInput) -> Result<CircleDto, CircleError>;

    /// Members only.
    async fn get(&self, user_id: i64, circle_id: i64) -> Result<CircleDto, CircleError>;

    async fn update(&self, user_id: i64, circle_id: i64, input: CircleInput) -> Result<CircleDto, CircleError>;

    async fn delete(&self, user_id: i64, circle_id: i64) -> Result<(), CircleError>;

    async fn add_member(&self, user_id: i64, circle_id: i64, member_id: i64) -> Result<CircleMemberDto, CircleError>;

    async fn remove_member(&self, user_id: i64, circle_id: i64, member_id: i64) -> Result<(), CircleError>;

    async fn members(&self, user_id: i64, circle_id: i64, page: Page) -> Result<Vec<CircleMemberDto>, CircleError>;

    async fn my_circles(&self, user_id: i64) -> Result<Vec<CircleDto>, CircleError>;
}

#[derive(Debug, Clone, Default)]
pub struct CircleInput {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleDto {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub member_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Circle> for CircleDto {
    fn from(circle: Circle) -> Self {
        Self {
            id: circle.id.to_string(),
            owner_id: circle.owner_id.to_string(),
            name: circle.name,
            description: circle.description,
            member_count: circle.member_count,
            created_at: circle.created_at.to_rfc3339(),
            updated_at: circle.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleMemberDto {
    pub user_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub joined_at: String,
}

impl From<CircleMemberProfile> for CircleMemberDto {
    fn from(member: CircleMemberProfile) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            username: Some(member.username),
            display_name: member.display_name,
            avatar_url: member.avatar_url,
            role: member.role.as_str().to_string(),
            joined_at: member.joined_at.to_rfc3339(),
        }
    }
}

impl From<CircleMember> for CircleMemberDto {
    fn from(member: CircleMember) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            username: None,
            display_name: None,
            avatar_url: None,
            role: member.role.as_str().to_string(),
            joined_at: member.joined_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircleError {
    #[error("Circle not found")]
    NotFound,

    #[error("You are not a member of this circle")]
    NotMember,

    #[error("Only the circle owner can do this")]
    NotOwner,

    #[error("User not found")]
    UserNotFound,

    #[error("User is already a member")]
    AlreadyMember,

    #[error("User is not a member")]
    MemberNotFound,

    #[error("The owner cannot leave the circle")]
    OwnerCannotLeave,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<CircleError> for AppError {
    fn from(err: CircleError) -> Self {
        match err {
            CircleError::NotFound | CircleError::UserNotFound | CircleError::MemberNotFound => {
                AppError::NotFound(err.to_string())
            }
            CircleError::NotMember | CircleError::NotOwner => AppError::Forbidden(err.to_string()),
            CircleError::AlreadyMember => AppError::Conflict(err.to_string()),
            CircleError::OwnerCannotLeave => AppError::BadRequest(err.to_string()),
            CircleError::Store(e) => e,
        }
    }
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

pub struct CircleServiceImpl<C, G, N>
where
    C: CircleRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    circle_repo: Arc<C>,
    graph: Arc<G>,
    notification_repo: Arc<N>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<C, G, N> CircleServiceImpl<C, G, N>
where
    C: CircleRepository,
    G: SocialGraph,
    N: NotificationRepository,
{
    pub fn new(
        circle_repo: Arc<C>,
        graph: Arc<G>,
        notification_repo: Arc<N>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            circle_repo,
            graph,
            notification_repo,
            id_generator,
        }
    }

    async fn load(&self, circle_id: i64) -> Result<Circle, CircleError> {
        self.circle_repo
            .find_by_id(circle_id)
            .await?
            .ok_or(CircleError::NotFound)
    }

    async fn load_owned(&self, user_id: i64, circle_id: i64) -> Result<Circle, CircleError> {
        let circle = self.load(circle_id).await?;
        if !circle.is_owner(user_id) {
            return Err(CircleError::NotOwner);
        }
        Ok(circle)
    }

    async fn ensure_member(&self, circle_id: i64, user_id: i64) -> Result<(), CircleError> {
        match self.circle_repo.find_member(circle_id, user_id).await? {
            Some(_) => Ok(()),
            None => Err(CircleError::NotMember),
        }
    }
}

#[async_trait]
impl<C, G, N> CircleService for CircleServiceImpl<C, G, N>
where
    C: CircleRepository + 'static,
    G: SocialGraph + 'static,
    N: NotificationRepository + 'static,
{
    async fn create(&self, owner_id: i64, input: CircleInput) -> Result<CircleDto, CircleError> {
        let circle = Circle::new(
            self.id_generator.generate(),
            owner_id,
            input.name.trim().to_string(),
            clean_description(input.description),
        );
        let created = self.circle_repo.create(&circle).await?;

        info!(circle_id = created.id, owner_id, "Circle created");
        Ok(created.into())
    }

    async fn get(&self, user_id: i64, circle_id: i64) -> Result<CircleDto, CircleError> {
        let circle = self.load(circle_id).await?;
        self.ensure_member(circle_id, user_id).await?;
        Ok(circle.into())
    }

    async fn update(&self, user_id: i64, circle_id: i64, input: CircleInput) -> Result<CircleDto, CircleError> {
        let mut circle = self.load_owned(user_id, circle_id).await?;
        circle.name = input.name.trim().to_string();
        circle.description = clean_description(input.description);
        circle.updated_at = chrono::Utc::now();

        Ok(self.circle_repo.update(&circle).await?.into())
    }

    async fn delete(&self, user_id: i64, circle_id: i64) -> Result<(), CircleError> {
        self.load_owned(user_id, circle_id).await?;
        self.circle_repo.delete(circle_id).await?;
        info!(circle_id, "Circle deleted");
        Ok(())
    }

    async fn add_member(&self, user_id: i64, circle_id: i64, member_id: i64) -> Result<CircleMemberDto, CircleError> {
        let circle = self.load_owned(user_id, circle_id).await?;
        if !self.graph.user_exists(member_id).await? {
            return Err(CircleError::UserNotFound);
        }
        if self.circle_repo.find_member(circle_id, member_id).await?.is_some() {
            return Err(CircleError::AlreadyMember);
        }

        let member = CircleMember::new(circle_id, member_id, CircleRole::Member);
        let added = self
            .circle_repo
            .add_member(&member)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => CircleError::AlreadyMember,
                e => CircleError::Store(e),
            })?;

        let notification = Notification::new(
            self.id_generator.generate(),
            member_id,
            user_id,
            NotificationKind::CircleAdded,
            Some(circle_id),
        )
        .with_data(serde_json::json!({ "circle_name": circle.name }));
        self.notification_repo.create(&notification).await?;

        Ok(added.into())
    }

    async fn remove_member(&self, user_id: i64, circle_id: i64, member_id: i64) -> Result<(), CircleError> {
        let circle = self.load(circle_id).await?;

        if member_id == user_id {
            if circle.is_owner(user_id) {
                return Err(CircleError::OwnerCannotLeave);
            }
        } else if !circle.is_owner(user_id) {
            return Err(CircleError::NotOwner);
        }

        if !self.circle_repo.remove_member(circle_id, member_id).await? {
            return Err(CircleError::MemberNotFound);
        }
        Ok(())
    }

    async fn members(&self, user_id: i64, circle_id: i64, page: Page) -> Result<Vec<CircleMemberDto>, CircleError> {
        self.load(circle_id).await?;
        self.ensure_member(circle_id, user_id).await?;

        let members = self
            .circle_repo
            .list_members(circle_id, page.before, page.limit)
            .await?;
        Ok(members.into_iter().map(CircleMemberDto::from).collect())
    }

    async fn my_circles(&self, user_id: i64) -> Result<Vec<CircleDto>, CircleError> {
        let circles = self.circle_repo.list_for_user(user_id).await?;
        Ok(circles.into_iter().map(CircleDto::from).collect())
    }
}
