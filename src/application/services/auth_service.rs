//! Authentication Service
//!
//! Handles registration (with Turnstile), password and Google sign-in,
//! JWT issuance and refresh-token sessions.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::JwtSettings;
use crate::domain::services::{CaptchaVerifier, IdentityVerifier, VerificationError};
use crate::domain::{Session, SessionRepository, User, UserRepository, UserRole};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

const MAX_USERNAME_LEN: usize = 32;

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user
    async fn register(&self, request: RegisterDto) -> Result<(User, AuthTokens), AuthError>;

    /// Authenticate user with credentials
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        client: ClientInfo,
    ) -> Result<(User, AuthTokens), AuthError>;

    /// Sign in (or sign up) with a Google ID token
    async fn google_sign_in(
        &self,
        id_token: &str,
        client: ClientInfo,
    ) -> Result<(User, AuthTokens), AuthError>;

    /// Refresh access token using refresh token
    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;

    /// Revoke refresh token (logout)
    async fn revoke_token(&self, refresh_token: &str) -> Result<(), AuthError>;

    /// Get the account behind an authenticated request
    async fn get_current_user(&self, user_id: i64) -> Result<User, AuthError>;
}

/// Registration input
#[derive(Debug, Clone, Default)]
pub struct RegisterDto {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub captcha_token: Option<String>,
    pub client: ClientInfo,
}

/// Request metadata stored on the refresh session
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Platform role at issue time
    pub role: UserRole,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// JWT ID for token revocation tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse::<i64>().map_err(|_| AuthError::InvalidToken)
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists")]
    EmailExists,

    #[error("Username already exists")]
    UsernameExists,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Account suspended")]
    Suspended,

    #[error("Captcha verification failed")]
    CaptchaFailed,

    #[error("Google sign-in failed: {0}")]
    GoogleRejected(String),

    #[error("Verification service unavailable: {0}")]
    VerificationUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid email or password".into()),
            AuthError::TokenExpired => AppError::Unauthorized("Token expired".into()),
            AuthError::InvalidToken | AuthError::SessionNotFound => {
                AppError::Unauthorized("Invalid or expired token".into())
            }
            AuthError::UserNotFound => AppError::NotFound("User not found".into()),
            AuthError::EmailExists => AppError::Conflict("Email already registered".into()),
            AuthError::UsernameExists => AppError::Conflict("Username already taken".into()),
            AuthError::Suspended => AppError::Forbidden("Account suspended".into()),
            AuthError::CaptchaFailed => AppError::Forbidden("Captcha verification failed".into()),
            AuthError::GoogleRejected(_) => AppError::Unauthorized("Invalid Google token".into()),
            AuthError::VerificationUnavailable(msg) => AppError::ServiceUnavailable(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::Store(e) => e,
        }
    }
}

/// Decode and validate an access token.
pub fn decode_access_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Derive a username candidate from an email local part.
fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => Some(c),
            'A'..='Z' => Some(c.to_ascii_lowercase()),
            '.' | '-' | '+' => Some('_'),
            _ => None,
        })
        .take(MAX_USERNAME_LEN - 6)
        .collect();
    if base.len() < 3 {
        base = format!("user{base}");
    }
    base
}

/// AuthService implementation
pub struct AuthServiceImpl<U, S, C, G>
where
    U: UserRepository,
    S: SessionRepository,
    C: CaptchaVerifier,
    G: IdentityVerifier,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    captcha: Arc<C>,
    google: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
    jwt_settings: JwtSettings,
}

impl<U, S, C, G> AuthServiceImpl<U, S, C, G>
where
    U: UserRepository,
    S: SessionRepository,
    C: CaptchaVerifier,
    G: IdentityVerifier,
{
    /// Create a new AuthServiceImpl
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        captcha: Arc<C>,
        google: Arc<G>,
        id_generator: Arc<SnowflakeGenerator>,
        jwt_settings: JwtSettings,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            captcha,
            google,
            id_generator,
            jwt_settings,
        }
    }

    /// Hash a password using Argon2id
    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let now = Utc::now();
        let access_expiry = now + Duration::minutes(self.jwt_settings.access_token_expiry_minutes);

        let access_claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            exp: access_expiry.timestamp(),
            iat: now.timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.jwt_settings.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

        // Opaque refresh token; only its hash is stored
        let refresh_token = format!("{}.{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: self.jwt_settings.access_token_expiry_minutes * 60,
            token_type: "Bearer".to_string(),
        })
    }

    /// Hash refresh token for storage
    fn hash_refresh_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Issue tokens and persist the refresh session
    async fn start_session(&self, user: &User, client: ClientInfo) -> Result<AuthTokens, AuthError> {
        let tokens = self.generate_tokens(user)?;

        let mut session = Session::new(
            user.id,
            self.hash_refresh_token(&tokens.refresh_token),
            Utc::now() + Duration::days(self.jwt_settings.refresh_token_expiry_days),
        );
        session.user_agent = client.user_agent;
        session.ip_address = client.ip_address;

        self.session_repo.create(&session).await?;

        Ok(tokens)
    }

    async fn check_captcha(&self, token: Option<String>, ip: Option<String>) -> Result<(), AuthError> {
        match self.captcha.verify(token, ip).await {
            Ok(()) => Ok(()),
            Err(VerificationError::Rejected(_)) => Err(AuthError::CaptchaFailed),
            Err(VerificationError::Unavailable(reason)) if self.captcha.fail_open() => {
                warn!(%reason, "Captcha unavailable, allowing registration");
                Ok(())
            }
            Err(VerificationError::Unavailable(reason)) => {
                Err(AuthError::VerificationUnavailable(reason))
            }
        }
    }

    /// Pick a free username for a Google-created account.
    async fn unique_username(&self, email: &str, user_id: i64) -> Result<String, AuthError> {
        let base = username_from_email(email);
        if !self.user_repo.username_exists(&base).await? {
            return Ok(base);
        }

        for _ in 0..5 {
            let suffix: u32 = rand::rng().random_range(1000..100_000);
            let candidate = format!("{base}{suffix}");
            if !self.user_repo.username_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        Ok(format!("user{user_id}"))
    }
}

#[async_trait]
impl<U, S, C, G> AuthService for AuthServiceImpl<U, S, C, G>
where
    U: UserRepository + 'static,
    S: SessionRepository + 'static,
    C: CaptchaVerifier + 'static,
    G: IdentityVerifier + 'static,
{
    async fn register(&self, request: RegisterDto) -> Result<(User, AuthTokens), AuthError> {
        self.check_captcha(request.captcha_token, request.client.ip_address.clone())
            .await?;

        let email = request.email.trim().to_lowercase();

        if self.user_repo.email_exists(&email).await? {
            return Err(AuthError::EmailExists);
        }

        if self.user_repo.username_exists(&request.username).await? {
            return Err(AuthError::UsernameExists);
        }

        let password_hash = self.hash_password(&request.password)?;

        let mut user = User::new(
            self.id_generator.generate(),
            &request.username,
            &email,
            Some(password_hash),
        );
        user.profile.display_name = request.display_name;

        let created_user = self.user_repo.create(&user).await.map_err(|e| match e {
            AppError::Conflict(_) => AuthError::UsernameExists,
            e => AuthError::Store(e),
        })?;

        let tokens = self.start_session(&created_user, request.client).await?;

        info!(user_id = created_user.id, "User registered");
        Ok((created_user, tokens))
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        client: ClientInfo,
    ) -> Result<(User, AuthTokens), AuthError> {
        let user = self
            .user_repo
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Google-only accounts have no password
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        if user.is_suspended() {
            return Err(AuthError::Suspended);
        }

        let tokens = self.start_session(&user, client).await?;
        Ok((user, tokens))
    }

    async fn google_sign_in(
        &self,
        id_token: &str,
        client: ClientInfo,
    ) -> Result<(User, AuthTokens), AuthError> {
        let identity = self.google.verify_id_token(id_token).await.map_err(|e| match e {
            VerificationError::Rejected(reason) => AuthError::GoogleRejected(reason),
            VerificationError::Unavailable(reason) => AuthError::VerificationUnavailable(reason),
        })?;

        let user = match self.user_repo.find_by_google_sub(&identity.subject).await? {
            Some(user) => user,
            None => match self.user_repo.find_by_email(&identity.email).await? {
                Some(mut user) => {
                    self.user_repo.link_google(user.id, &identity.subject).await?;
                    user.google_sub = Some(identity.subject.clone());
                    user
                }
                None => {
                    let id = self.id_generator.generate();
                    let username = self.unique_username(&identity.email, id).await?;
                    let mut user = User::new(id, &username, &identity.email, None);
                    user.google_sub = Some(identity.subject.clone());
                    user.profile.display_name = identity.name.clone();
                    user.profile.avatar_url = identity.picture.clone();

                    let created = self.user_repo.create(&user).await?;
                    info!(user_id = created.id, "User registered with Google");
                    created
                }
            },
        };

        if user.is_suspended() {
            return Err(AuthError::Suspended);
        }

        let tokens = self.start_session(&user, client).await?;
        Ok((user, tokens))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let token_hash = self.hash_refresh_token(refresh_token);

        let session = self
            .session_repo
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !session.is_active() {
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .user_repo
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_suspended() {
            self.session_repo.revoke(session.id).await?;
            return Err(AuthError::Suspended);
        }

        // Rotate: the presented token stops working
        let new_tokens = self.generate_tokens(&user)?;
        let new_token_hash = self.hash_refresh_token(&new_tokens.refresh_token);
        let new_expires_at =
            Utc::now() + Duration::days(self.jwt_settings.refresh_token_expiry_days);

        // Only one of two concurrent refreshes with the same token wins
        if !self
            .session_repo
            .rotate(session.id, &token_hash, &new_token_hash, new_expires_at)
            .await?
        {
            return Err(AuthError::SessionNotFound);
        }

        Ok(new_tokens)
    }

    async fn revoke_token(&self, refresh_token: &str) -> Result<(), AuthError> {
        let token_hash = self.hash_refresh_token(refresh_token);

        if let Some(session) = self.session_repo.find_by_token_hash(&token_hash).await? {
            self.session_repo.revoke(session.id).await?;
        }

        Ok(())
    }

    async fn get_current_user(&self, user_id: i64) -> Result<User, AuthError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::{GoogleIdentity, MockCaptchaVerifier, MockIdentityVerifier};
    use crate::domain::{AccountStatus, MockSessionRepository, MockUserRepository};
    use mockall::predicate::*;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    fn jwt() -> JwtSettings {
        JwtSettings {
            secret: SECRET.into(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 30,
        }
    }

    fn service(
        users: MockUserRepository,
        sessions: MockSessionRepository,
        captcha: MockCaptchaVerifier,
        google: MockIdentityVerifier,
    ) -> AuthServiceImpl<MockUserRepository, MockSessionRepository, MockCaptchaVerifier, MockIdentityVerifier>
    {
        AuthServiceImpl::new(
            Arc::new(users),
            Arc::new(sessions),
            Arc::new(captcha),
            Arc::new(google),
            Arc::new(SnowflakeGenerator::new(1, 1)),
            jwt(),
        )
    }

    fn passing_captcha() -> MockCaptchaVerifier {
        let mut captcha = MockCaptchaVerifier::new();
        captcha.expect_verify().returning(|_, _| Ok(()));
        captcha
    }

    fn register_dto() -> RegisterDto {
        RegisterDto {
            username: "ada".into(),
            email: "Ada@Example.com".into(),
            password: "correct horse battery".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_issues_tokens() {
        let mut users = MockUserRepository::new();
        users
            .expect_email_exists()
            .with(eq("ada@example.com"))
            .returning(|_| Ok(false));
        users.expect_username_exists().returning(|_| Ok(false));
        users.expect_create().returning(|u| Ok(u.clone()));
        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().times(1).returning(|s| Ok(s.clone()));

        let svc = service(users, sessions, passing_captcha(), MockIdentityVerifier::new());
        let (user, tokens) = svc.register(register_dto()).await.unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert!(user.password_hash.as_deref().unwrap().starts_with("$argon2"));

        let claims = decode_access_token(SECRET, &tokens.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let mut users = MockUserRepository::new();
        users.expect_email_exists().returning(|_| Ok(true));

        let svc = service(
            users,
            MockSessionRepository::new(),
            passing_captcha(),
            MockIdentityVerifier::new(),
        );
        let err = svc.register(register_dto()).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailExists));
    }

    #[tokio::test]
    async fn test_register_rejected_captcha_is_forbidden() {
        let mut captcha = MockCaptchaVerifier::new();
        captcha
            .expect_verify()
            .returning(|_, _| Err(VerificationError::Rejected("bad".into())));

        let svc = service(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            captcha,
            MockIdentityVerifier::new(),
        );
        let err = svc.register(register_dto()).await.unwrap_err();
        assert_eq!(AppError::from(err).status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_register_unavailable_captcha_fail_closed() {
        let mut captcha = MockCaptchaVerifier::new();
        captcha
            .expect_verify()
            .returning(|_, _| Err(VerificationError::Unavailable("down".into())));
        captcha.expect_fail_open().return_const(false);

        let svc = service(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            captcha,
            MockIdentityVerifier::new(),
        );
        let err = svc.register(register_dto()).await.unwrap_err();
        assert!(matches!(err, AuthError::VerificationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_register_unavailable_captcha_fail_open_proceeds() {
        let mut captcha = MockCaptchaVerifier::new();
        captcha
            .expect_verify()
            .returning(|_, _| Err(VerificationError::Unavailable("down".into())));
        captcha.expect_fail_open().return_const(true);
        let mut users = MockUserRepository::new();
        users.expect_email_exists().returning(|_| Ok(false));
        users.expect_username_exists().returning(|_| Ok(false));
        users.expect_create().returning(|u| Ok(u.clone()));
        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().returning(|s| Ok(s.clone()));

        let svc = service(users, sessions, captcha, MockIdentityVerifier::new());
        assert!(svc.register(register_dto()).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let hasher = service(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            MockCaptchaVerifier::new(),
            MockIdentityVerifier::new(),
        );
        let hash = hasher.hash_password("right password").unwrap();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(User::new(1, "ada", "ada@example.com", Some(hash.clone())))));

        let svc = service(
            users,
            MockSessionRepository::new(),
            MockCaptchaVerifier::new(),
            MockIdentityVerifier::new(),
        );
        let err = svc
            .authenticate("ada@example.com", "wrong password", ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_suspended_account() {
        let hasher = service(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            MockCaptchaVerifier::new(),
            MockIdentityVerifier::new(),
        );
        let hash = hasher.hash_password("right password").unwrap();

        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |_| {
            let mut user = User::new(1, "ada", "ada@example.com", Some(hash.clone()));
            user.status = AccountStatus::Suspended;
            Ok(Some(user))
        });

        let svc = service(
            users,
            MockSessionRepository::new(),
            MockCaptchaVerifier::new(),
            MockIdentityVerifier::new(),
        );
        let err = svc
            .authenticate("ada@example.com", "right password", ClientInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Suspended));
    }

    #[tokio::test]
    async fn test_google_sign_in_links_existing_email() {
        let mut google = MockIdentityVerifier::new();
        google.expect_verify_id_token().returning(|_| {
            Ok(GoogleIdentity {
                subject: "sub-1".into(),
                email: "ada@example.com".into(),
                name: None,
                picture: None,
            })
        });
        let mut users = MockUserRepository::new();
        users.expect_find_by_google_sub().returning(|_| Ok(None));
        users
            .expect_find_by_email()
            .returning(|_| Ok(Some(User::new(7, "ada", "ada@example.com", None))));
        users
            .expect_link_google()
            .with(eq(7), eq("sub-1"))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut sessions = MockSessionRepository::new();
        sessions.expect_create().returning(|s| Ok(s.clone()));

        let svc = service(users, sessions, MockCaptchaVerifier::new(), google);
        let (user, _) = svc.google_sign_in("token", ClientInfo::default()).await.unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.google_sub.as_deref(), Some("sub-1"));
    }

    #[tokio::test]
    async fn test_google_unavailable_fails_closed() {
        let mut google = MockIdentityVerifier::new();
        google
            .expect_verify_id_token()
            .returning(|_| Err(VerificationError::Unavailable("timeout".into())));

        let svc = service(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            MockCaptchaVerifier::new(),
            google,
        );
        let err = svc.google_sign_in("token", ClientInfo::default()).await.unwrap_err();
        assert_eq!(
            AppError::from(err).status(),
            axum::http::StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_find_by_token_hash().returning(|_| Ok(None));

        let svc = service(
            MockUserRepository::new(),
            sessions,
            MockCaptchaVerifier::new(),
            MockIdentityVerifier::new(),
        );
        assert!(matches!(
            svc.refresh_token("nope").await.unwrap_err(),
            AuthError::SessionNotFound
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_session() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_find_by_token_hash().returning(|hash| {
            Ok(Some(Session::new(
                3,
                hash.to_string(),
                Utc::now() + Duration::days(1),
            )))
        });
        sessions
            .expect_rotate()
            .withf(|_, old, new, _| old != new)
            .times(1)
            .returning(|_, _, _, _| Ok(true));
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(User::new(id, "bob", "bob@example.com", None))));

        let svc = service(users, sessions, MockCaptchaVerifier::new(), MockIdentityVerifier::new());
        let tokens = svc.refresh_token("old.token").await.unwrap();
        assert_ne!(tokens.refresh_token, "old.token");
    }

    #[tokio::test]
    async fn test_refresh_losing_rotation_race_is_rejected() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_find_by_token_hash().returning(|hash| {
            Ok(Some(Session::new(
                3,
                hash.to_string(),
                Utc::now() + Duration::days(1),
            )))
        });
        // Another refresh already replaced the hash
        sessions.expect_rotate().returning(|_, _, _, _| Ok(false));
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(User::new(id, "bob", "bob@example.com", None))));

        let svc = service(users, sessions, MockCaptchaVerifier::new(), MockIdentityVerifier::new());
        let err = svc.refresh_token("old.token").await.unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound));
        assert_eq!(AppError::from(err).status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_unknown_token_is_ok() {
        let mut sessions = MockSessionRepository::new();
        sessions.expect_find_by_token_hash().returning(|_| Ok(None));
        sessions.expect_revoke().never();

        let svc = service(
            MockUserRepository::new(),
            sessions,
            MockCaptchaVerifier::new(),
            MockIdentityVerifier::new(),
        );
        assert!(svc.revoke_token("whatever").await.is_ok());
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("Ada.Lovelace+x@example.com"), "ada_lovelace_x");
        assert_eq!(username_from_email("a@example.com"), "usera");
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let svc = service(
            MockUserRepository::new(),
            MockSessionRepository::new(),
            MockCaptchaVerifier::new(),
            MockIdentityVerifier::new(),
        );
        let tokens = svc
            .generate_tokens(&User::new(1, "ada", "ada@example.com", None))
            .unwrap();
        assert!(matches!(
            decode_access_token("another-secret-another-secret-another", &tokens.access_token),
            Err(AuthError::InvalidToken)
        ));
    }
}
