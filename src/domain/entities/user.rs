//! User entity and repository trait.
//!
//! Maps to the `users` and `profiles` tables in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Platform role matching the `users.role` VARCHAR constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Self::Admin,
            "moderator" => Self::Moderator,
            _ => Self::User,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// Only admins may use the admin surface.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "suspended" => Self::Suspended,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }
}

/// Public profile fields, stored in `profiles` (1:1 with `users`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

/// Represents a user account.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - username: VARCHAR(32) NOT NULL UNIQUE
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - password_hash: VARCHAR(255) NULL (NULL for Google-only accounts)
/// - google_sub: VARCHAR(255) NULL UNIQUE
/// - e2ee_public_key: TEXT NULL
/// - role: VARCHAR(16) NOT NULL DEFAULT 'user'
/// - status: VARCHAR(16) NOT NULL DEFAULT 'active'
/// - suspended_reason: TEXT NULL
/// - created_at / updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Username (3-32 characters, unique)
    pub username: String,

    /// Email address (unique)
    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Google account subject for Google Sign-In
    #[serde(skip_serializing)]
    pub google_sub: Option<String>,

    /// Published X25519 public key (base64) for end-to-end encrypted messages
    pub e2ee_public_key: Option<String>,

    pub role: UserRole,

    pub status: AccountStatus,

    pub suspended_reason: Option<String>,

    pub profile: Profile,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a fresh active account with an empty profile.
    pub fn new(id: i64, username: &str, email: &str, password_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: username.to_string(),
            email: email.to_lowercase(),
            password_hash,
            google_sub: None,
            e2ee_public_key: None,
            role: UserRole::User,
            status: AccountStatus::Active,
            suspended_reason: None,
            profile: Profile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the user's display name, falling back to username if not set.
    pub fn display_name_or_username(&self) -> &str {
        self.profile
            .display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }

    pub fn is_suspended(&self) -> bool {
        self.status == AccountStatus::Suspended
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            display_name: self.profile.display_name.clone(),
            avatar_url: self.profile.avatar_url.clone(),
        }
    }
}

/// Compact user reference used in lists (followers, members, participants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Admin search filter.
#[derive(Debug, Clone, Default)]
pub struct UserSearch {
    pub query: Option<String>,
    pub status: Option<AccountStatus>,
    pub before: Option<i64>,
    pub limit: i64,
}

/// Repository trait for User data access operations.
///
/// Implementations of this trait handle the actual database interactions.
/// The trait is defined in the domain layer to maintain dependency inversion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by their Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find a user by their email address (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Find a user by Google account subject.
    async fn find_by_google_sub(&self, sub: &str) -> Result<Option<User>, AppError>;

    /// Create a user together with its profile row.
    async fn create(&self, user: &User) -> Result<User, AppError>;

    /// Update username and profile fields.
    async fn update(&self, user: &User) -> Result<User, AppError>;

    /// Check if an email address is already registered.
    async fn email_exists(&self, email: &str) -> Result<bool, AppError>;

    /// Check if a username is already taken.
    async fn username_exists(&self, username: &str) -> Result<bool, AppError>;

    /// Attach a Google subject to an existing account.
    async fn link_google(&self, id: i64, sub: &str) -> Result<(), AppError>;

    /// Publish or replace the user's E2EE public key.
    async fn set_e2ee_key(&self, id: i64, public_key: &str) -> Result<(), AppError>;

    /// Search by username or display name, newest first.
    async fn search(&self, search: &UserSearch) -> Result<Vec<User>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user() -> User {
        User::new(12345678901234567, "testuser", "Test@Example.com", Some("hash".into()))
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("ADMIN"), UserRole::Admin);
        assert_eq!(UserRole::from_str("moderator"), UserRole::Moderator);
        assert_eq!(UserRole::from_str("whatever"), UserRole::User);
    }

    #[test]
    fn test_only_admin_role_is_admin() {
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Moderator.is_admin());
        assert!(!UserRole::User.is_admin());
    }

    #[test]
    fn test_account_status_round_trip() {
        for status in [AccountStatus::Active, AccountStatus::Suspended] {
            assert_eq!(AccountStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_new_user_normalizes_email() {
        let user = create_test_user();
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.role, UserRole::User);
        assert!(!user.is_suspended());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = create_test_user();
        assert_eq!(user.display_name_or_username(), "testuser");

        user.profile.display_name = Some(String::new());
        assert_eq!(user.display_name_or_username(), "testuser");

        user.profile.display_name = Some("Tess".into());
        assert_eq!(user.display_name_or_username(), "Tess");
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut user = create_test_user();
        user.google_sub = Some("google-sub-123".into());

        let serialized = serde_json::to_string(&user).expect("Failed to serialize user");

        assert!(!serialized.contains("password_hash"));
        assert!(!serialized.contains("google-sub-123"));
        assert!(serialized.contains("\"role\":\"user\""));
    }
}
