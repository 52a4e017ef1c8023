//! User Service
//!
//! Profiles, user lookup/search and E2EE public key publication.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::domain::{
    AccountStatus, FollowRepository, User, UserRepository, UserSearch,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;

/// Decoded length of an X25519 public key.
pub const E2EE_PUBLIC_KEY_LEN: usize = 32;

/// User service trait
#[async_trait]
pub trait UserService: Send + Sync {
    /// The caller's own account, including email
    async fn get_me(&self, user_id: i64) -> Result<UserDto, UserError>;

    /// Public view of a user
    async fn get_user(&self, user_id: i64) -> Result<UserDto, UserError>;

    /// Update user profile
    async fn update_profile(&self, user_id: i64, update: UpdateProfileDto) -> Result<UserDto, UserError>;

    /// Search active users by username or display name
    async fn search(&self, query: &str, page: Page) -> Result<Vec<UserDto>, UserError>;

    /// Publish the caller's E2EE public key
    async fn set_public_key(&self, user_id: i64, public_key: &str) -> Result<PublicKeyDto, UserError>;

    /// Fetch a user's E2EE public key
    async fn get_public_key(&self, user_id: i64) -> Result<PublicKeyDto, UserError>;
}

/// User data transfer object
#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub role: String,
    pub status: String,
    pub has_e2ee_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following_count: Option<i64>,
    pub created_at: String,
}

impl UserDto {
    pub fn from_user(user: User, include_email: bool) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            email: include_email.then_some(user.email),
            display_name: user.profile.display_name,
            bio: user.profile.bio,
            avatar_url: user.profile.avatar_url,
            location: user.profile.location,
            website: user.profile.website,
            role: user.role.as_str().to_string(),
            status: user.status.as_str().to_string(),
            has_e2ee_key: user.e2ee_public_key.is_some(),
            followers_count: None,
            following_count: None,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Update profile request
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileDto {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

/// Published E2EE key
#[derive(Debug, Clone, Serialize)]
pub struct PublicKeyDto {
    pub user_id: String,
    pub public_key: String,
}

/// User service errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Public key must be base64 encoding {E2EE_PUBLIC_KEY_LEN} bytes")]
    InvalidPublicKey,

    #[error("No public key published")]
    NoPublicKey,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound("User not found".into()),
            UserError::UsernameTaken => AppError::Conflict("Username already taken".into()),
            UserError::InvalidPublicKey => AppError::field("public_key", err.to_string()),
            UserError::NoPublicKey => AppError::NotFound("No public key published".into()),
            UserError::Store(e) => e,
        }
    }
}

/// Check that a key is standard base64 of exactly 32 bytes.
pub fn is_valid_public_key(key: &str) -> bool {
    STANDARD
        .decode(key.trim())
        .map(|bytes| bytes.len() == E2EE_PUBLIC_KEY_LEN)
        .unwrap_or(false)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// UserService implementation
pub struct UserServiceImpl<U, F>
where
    U: UserRepository,
    F: FollowRepository,
{
    user_repo: Arc<U>,
    follow_repo: Arc<F>,
}

impl<U, F> UserServiceImpl<U, F>
where
    U: UserRepository,
    F: FollowRepository,
{
    pub fn new(user_repo: Arc<U>, follow_repo: Arc<F>) -> Self {
        Self {
            user_repo,
            follow_repo,
        }
    }

    async fn load(&self, user_id: i64) -> Result<User, UserError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn with_counts(&self, mut dto: UserDto, user_id: i64) -> Result<UserDto, UserError> {
        let counts = self.follow_repo.counts(user_id).await?;
        dto.followers_count = Some(counts.followers);
        dto.following_count = Some(counts.following);
        Ok(dto)
    }
}

#[async_trait]
impl<U, F> UserService for UserServiceImpl<U, F>
where
    U: UserRepository + 'static,
    F: FollowRepository + 'static,
{
    async fn get_me(&self, user_id: i64) -> Result<UserDto, UserError> {
        let user = self.load(user_id).await?;
        self.with_counts(UserDto::from_user(user, true), user_id).await
    }

    async fn get_user(&self, user_id: i64) -> Result<UserDto, UserError> {
        let user = self.load(user_id).await?;
        // Suspended accounts are hidden from other users
        if user.is_suspended() {
            return Err(UserError::NotFound);
        }
        self.with_counts(UserDto::from_user(user, false), user_id).await
    }

    async fn update_profile(&self, user_id: i64, update: UpdateProfileDto) -> Result<UserDto, UserError> {
        let mut user = self.load(user_id).await?;

        if let Some(new_username) = update.username {
            if !new_username.eq_ignore_ascii_case(&user.username) {
                if self.user_repo.username_exists(&new_username).await? {
                    return Err(UserError::UsernameTaken);
                }
            }
            user.username = new_username;
        }

        // Empty strings clear a field
        if let Some(display_name) = update.display_name {
            user.profile.display_name = non_empty(display_name);
        }
        if let Some(bio) = update.bio {
            user.profile.bio = non_empty(bio);
        }
        if let Some(avatar_url) = update.avatar_url {
            user.profile.avatar_url = non_empty(avatar_url);
        }
        if let Some(location) = update.location {
            user.profile.location = non_empty(location);
        }
        if let Some(website) = update.website {
            user.profile.website = non_empty(website);
        }

        let updated = self.user_repo.update(&user).await.map_err(|e| match e {
            AppError::Conflict(_) => UserError::UsernameTaken,
            e => UserError::Store(e),
        })?;

        Ok(UserDto::from_user(updated, true))
    }

    async fn search(&self, query: &str, page: Page) -> Result<Vec<UserDto>, UserError> {
        let users = self
            .user_repo
            .search(&UserSearch {
                query: Some(query.trim().to_string()).filter(|q| !q.is_empty()),
                status: Some(AccountStatus::Active),
                before: page.before,
                limit: page.limit,
            })
            .await?;

        Ok(users
            .into_iter()
            .map(|u| UserDto::from_user(u, false))
            .collect())
    }

    async fn set_public_key(&self, user_id: i64, public_key: &str) -> Result<PublicKeyDto, UserError> {
        let key = public_key.trim();
        if !is_valid_public_key(key) {
            return Err(UserError::InvalidPublicKey);
        }

        self.user_repo.set_e2ee_key(user_id, key).await?;

        Ok(PublicKeyDto {
            user_id: user_id.to_string(),
            public_key: key.to_string(),
        })
    }

    async fn get_public_key(&self, user_id: i64) -> Result<PublicKeyDto, UserError> {
        let user = self.load(user_id).await?;
        let public_key = user.e2ee_public_key.ok_or(UserError::NoPublicKey)?;

        Ok(PublicKeyDto {
            user_id: user.id.to_string(),
            public_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FollowCounts, MockFollowRepository, MockUserRepository};
    use pretty_assertions::assert_eq;

    fn service(
        users: MockUserRepository,
        follows: MockFollowRepository,
    ) -> UserServiceImpl<MockUserRepository, MockFollowRepository> {
        UserServiceImpl::new(Arc::new(users), Arc::new(follows))
    }

    #[tokio::test]
    async fn test_public_view_hides_email() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(User::new(id, "ada", "ada@example.com", None))));
        let mut follows = MockFollowRepository::new();
        follows.expect_counts().returning(|_| {
            Ok(FollowCounts {
                followers: 3,
                following: 1,
            })
        });

        let dto = service(users, follows).get_user(5).await.unwrap();
        assert_eq!(dto.email, None);
        assert_eq!(dto.followers_count, Some(3));
        assert_eq!(dto.id, "5");
    }

    #[tokio::test]
    async fn test_suspended_user_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| {
            let mut user = User::new(id, "spam", "spam@example.com", None);
            user.status = AccountStatus::Suspended;
            Ok(Some(user))
        });

        let err = service(users, MockFollowRepository::new())
            .get_user(5)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::NotFound));
    }

    #[tokio::test]
    async fn test_update_profile_rejects_taken_username() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(User::new(id, "ada", "ada@example.com", None))));
        users.expect_username_exists().returning(|_| Ok(true));

        let update = UpdateProfileDto {
            username: Some("grace".into()),
            ..Default::default()
        };
        let err = service(users, MockFollowRepository::new())
            .update_profile(1, update)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken));
    }

    #[tokio::test]
    async fn test_update_profile_clears_empty_fields() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| {
            let mut user = User::new(id, "ada", "ada@example.com", None);
            user.profile.bio = Some("old".into());
            Ok(Some(user))
        });
        users.expect_update().returning(|u| Ok(u.clone()));

        let update = UpdateProfileDto {
            bio: Some("   ".into()),
            display_name: Some("Ada L.".into()),
            ..Default::default()
        };
        let dto = service(users, MockFollowRepository::new())
            .update_profile(1, update)
            .await
            .unwrap();
        assert_eq!(dto.bio, None);
        assert_eq!(dto.display_name.as_deref(), Some("Ada L."));
    }

    #[tokio::test]
    async fn test_public_key_must_be_32_bytes() {
        let svc = service(MockUserRepository::new(), MockFollowRepository::new());
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            svc.set_public_key(1, &short).await,
            Err(UserError::InvalidPublicKey)
        ));
        assert!(matches!(
            svc.set_public_key(1, "not base64!").await,
            Err(UserError::InvalidPublicKey)
        ));
    }

    #[tokio::test]
    async fn test_public_key_is_stored() {
        let key = STANDARD.encode([7u8; 32]);
        let mut users = MockUserRepository::new();
        users.expect_set_e2ee_key().times(1).returning(|_, _| Ok(()));

        let dto = service(users, MockFollowRepository::new())
            .set_public_key(1, &key)
            .await
            .unwrap();
        assert_eq!(dto.public_key, key);
    }
}
