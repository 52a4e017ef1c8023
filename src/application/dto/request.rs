//! Request DTOs
//!
//! Data structures for API request bodies and query strings. Bodies derive
//! `Validate`; handlers call `shared::validation::validate` before passing
//! anything to a service. Ids travel as strings and are parsed in handlers.

use serde::Deserialize;
use validator::Validate;

use crate::domain::{
    AccountStatus, CallKind, E2eeEnvelope, MemoryScope, ReportReason, ReportStatus, ReportTarget,
    SignalKind,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(max = 64, message = "Display name must be at most 64 characters"))]
    pub display_name: Option<String>,

    /// Turnstile response token from the client widget
    #[serde(alias = "cf-turnstile-response")]
    pub captcha_token: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Google sign-in request
#[derive(Debug, Deserialize, Validate)]
pub struct GoogleSignInRequest {
    #[validate(length(min = 1, message = "ID token is required"))]
    pub id_token: String,
}

/// Refresh token request (also used for logout)
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Update profile request
///
/// Absent fields are left untouched; empty strings clear the field.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: Option<String>,

    #[validate(length(max = 64, message = "Display name must be at most 64 characters"))]
    pub display_name: Option<String>,

    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,

    #[validate(length(max = 2048, message = "Avatar URL is too long"))]
    pub avatar_url: Option<String>,

    #[validate(length(max = 100, message = "Location must be at most 100 characters"))]
    pub location: Option<String>,

    #[validate(length(max = 2048, message = "Website URL is too long"))]
    pub website: Option<String>,
}

/// Publish an E2EE public key
#[derive(Debug, Deserialize, Validate)]
pub struct PublicKeyRequest {
    #[validate(length(min = 1, max = 256, message = "Public key is required"))]
    pub public_key: String,
}

/// `?q=` search string
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl SearchQuery {
    /// Trimmed query, empty when absent.
    pub fn term(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Circles
// ---------------------------------------------------------------------------

/// Create or update circle request
#[derive(Debug, Deserialize, Validate)]
pub struct CircleRequest {
    #[validate(length(min = 1, max = 80, message = "Circle name must be 1-80 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

/// Body naming a single user (friend requests, circle members)
#[derive(Debug, Deserialize, Validate)]
pub struct UserIdRequest {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Memories
// ---------------------------------------------------------------------------

/// Create memory request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMemoryRequest {
    pub scope: MemoryScope,

    #[validate(length(max = 5000, message = "Body must be at most 5000 characters"))]
    pub body: Option<String>,

    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 media items are allowed"))]
    pub media_urls: Vec<String>,

    /// Required for circle scope
    pub circle_id: Option<String>,

    /// Required for direct scope
    pub recipient_id: Option<String>,
}

/// Reshare request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReshareRequest {
    #[validate(length(max = 5000, message = "Body must be at most 5000 characters"))]
    pub body: Option<String>,

    pub scope: Option<MemoryScope>,
}

/// Comment request
#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    pub body: String,
}

/// Adopt (save to vault) request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdoptRequest {
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

/// `?after=<id>&limit=<n>` for oldest-first lists (comments, signals)
#[derive(Debug, Default, Deserialize)]
pub struct AfterQuery {
    pub after: Option<String>,
    pub limit: Option<i64>,
}

impl AfterQuery {
    pub fn after(&self) -> Result<Option<i64>, AppError> {
        self.after
            .as_deref()
            .map(|raw| parse_id(raw, "after"))
            .transpose()
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

/// Send message request: plaintext `content` or an E2EE `envelope`
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(max = 4000, message = "Message must be at most 4000 characters"))]
    pub content: Option<String>,

    pub envelope: Option<E2eeEnvelope>,
}

// ---------------------------------------------------------------------------
// Calls & live rooms
// ---------------------------------------------------------------------------

/// Start call request
#[derive(Debug, Deserialize, Validate)]
pub struct StartCallRequest {
    #[validate(length(min = 1, message = "Callee ID is required"))]
    pub callee_id: String,

    #[serde(default)]
    pub kind: CallKind,
}

/// Signal relay request
#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    pub kind: SignalKind,

    #[serde(default)]
    pub payload: serde_json::Value,

    /// Live rooms only; omitted means the host (or everyone, from the host)
    pub recipient_id: Option<String>,
}

/// Create live room request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLiveRoomRequest {
    #[validate(length(min = 1, max = 120, message = "Title must be 1-120 characters"))]
    pub title: String,
}

// ---------------------------------------------------------------------------
// Inbox & reports
// ---------------------------------------------------------------------------

/// `?unread=true`
#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread: bool,
}

/// Mark notifications read; no `ids` marks everything
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MarkReadRequest {
    #[validate(length(max = 100, message = "At most 100 IDs per request"))]
    pub ids: Option<Vec<String>>,
}

/// File a report
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportRequest {
    pub target_type: ReportTarget,

    #[validate(length(min = 1, message = "Target ID is required"))]
    pub target_id: String,

    pub reason: ReportReason,

    #[validate(length(max = 1000, message = "Details must be at most 1000 characters"))]
    pub details: Option<String>,
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// `?q=&status=` user search
#[derive(Debug, Default, Deserialize)]
pub struct AdminUserQuery {
    pub q: Option<String>,
    pub status: Option<AccountStatus>,
}

/// Reason attached to a moderation action
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ModerationReasonRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Suspend many users at once
#[derive(Debug, Deserialize, Validate)]
pub struct BulkSuspendRequest {
    #[validate(length(min = 1, max = 100, message = "Provide between 1 and 100 user IDs"))]
    pub user_ids: Vec<String>,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// `?status=` report filter
#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<ReportStatus>,
}

/// Close a report
#[derive(Debug, Deserialize, Validate)]
pub struct CloseReportRequest {
    pub outcome: ReportStatus,

    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

/// `?admin_id=` audit filter
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub admin_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::validation::validate;

    #[test]
    fn test_register_accepts_turnstile_field_name() {
        let body: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "correct horse",
            "cf-turnstile-response": "tok"
        }))
        .unwrap();

        assert_eq!(body.captcha_token.as_deref(), Some("tok"));
        assert!(validate(&body).is_ok());
    }

    #[test]
    fn test_register_reports_each_bad_field() {
        let body = RegisterRequest {
            username: "a".into(),
            email: "nope".into(),
            password: "short".into(),
            display_name: None,
            captcha_token: None,
        };

        match validate(&body) {
            Err(AppError::Validation(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "password", "username"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_memory_scope_parses_lowercase() {
        let body: CreateMemoryRequest = serde_json::from_value(serde_json::json!({
            "scope": "circle",
            "body": "hello",
            "circle_id": "42"
        }))
        .unwrap();

        assert_eq!(body.scope, MemoryScope::Circle);
        assert!(body.media_urls.is_empty());
    }

    #[test]
    fn test_bulk_suspend_bounds() {
        let empty = BulkSuspendRequest {
            user_ids: vec![],
            reason: None,
        };
        assert!(validate(&empty).is_err());

        let too_many = BulkSuspendRequest {
            user_ids: (1..=101).map(|i| i.to_string()).collect(),
            reason: None,
        };
        assert!(validate(&too_many).is_err());
    }

    #[test]
    fn test_call_kind_defaults_to_audio() {
        let body: StartCallRequest =
            serde_json::from_value(serde_json::json!({ "callee_id": "9" })).unwrap();
        assert_eq!(body.kind, CallKind::Audio);
    }

    #[test]
    fn test_after_cursor() {
        let query = AfterQuery {
            after: Some("15".into()),
            limit: Some(1000),
        };
        assert_eq!(query.after().unwrap(), Some(15));
        assert_eq!(query.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_search_term_trimmed() {
        let query = SearchQuery {
            q: Some("  ada ".into()),
        };
        assert_eq!(query.term(), "ada");
        assert_eq!(SearchQuery::default().term(), "");
    }
}
