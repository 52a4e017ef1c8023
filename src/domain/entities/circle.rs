//! Circle entity, membership and repository trait.
//!
//! Maps to the `circles` and `circle_members` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CircleRole {
    Owner,
    #[default]
    Member,
}

impl CircleRole {
    pub fn from_str(s: &str) -> Self {
        match s {
            "owner" => Self::Owner,
            _ => Self::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }
}

/// A named group of users sharing circle-scoped memories.
///
/// `member_count` is maintained in the same transaction as membership writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub member_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Circle {
    pub fn new(id: i64, owner_id: i64, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            name,
            description,
            member_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleMember {
    pub circle_id: i64,
    pub user_id: i64,
    pub role: CircleRole,
    pub joined_at: DateTime<Utc>,
}

impl CircleMember {
    pub fn new(circle_id: i64, user_id: i64, role: CircleRole) -> Self {
        Self {
            circle_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

/// Membership row joined with the member's public profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleMemberProfile {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: CircleRole,
    pub joined_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CircleRepository: Send + Sync {
    /// Insert the circle and its owner membership in one transaction.
    async fn create(&self, circle: &Circle) -> Result<Circle, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Circle>, AppError>;

    /// Update name and description.
    async fn update(&self, circle: &Circle) -> Result<Circle, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    async fn find_member(
        &self,
        circle_id: i64,
        user_id: i64,
    ) -> Result<Option<CircleMember>, AppError>;

    /// Insert a member and bump `member_count`. Conflict when already a member.
    async fn add_member(&self, member: &CircleMember) -> Result<CircleMember, AppError>;

    /// Delete a member and decrement `member_count`.
    async fn remove_member(&self, circle_id: i64, user_id: i64) -> Result<bool, AppError>;

    async fn list_members(
        &self,
        circle_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<CircleMemberProfile>, AppError>;

    /// Circles `user_id` belongs to, newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Circle>, AppError>;
}
