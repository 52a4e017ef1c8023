//! Response DTOs
//!
//! Data structures for API response bodies shared across services.

use serde::Serialize;

use crate::application::services::{AuthTokens, UserDto};
use crate::domain::{Signal, SignalKind, UserSummary};

/// Authentication tokens response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// Register / login / Google sign-in response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserDto,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

impl AuthResponse {
    pub fn new(user: UserDto, tokens: AuthTokens) -> Self {
        Self {
            user,
            tokens: tokens.into(),
        }
    }
}

/// Minimal public user reference used in lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummaryDto {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<UserSummary> for UserSummaryDto {
    fn from(user: UserSummary) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
        }
    }
}

/// Relayed signaling message
#[derive(Debug, Clone, Serialize)]
pub struct SignalDto {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: Option<String>,
    pub kind: SignalKind,
    pub payload: serde_json::Value,
    pub created_at: String,
}

impl From<Signal> for SignalDto {
    fn from(signal: Signal) -> Self {
        Self {
            id: signal.id.to_string(),
            sender_id: signal.sender_id.to_string(),
            recipient_id: signal.recipient_id.map(|id| id.to_string()),
            kind: signal.kind,
            payload: signal.payload,
            created_at: signal.created_at.to_rfc3339(),
        }
    }
}

/// Cursor-paged list
///
/// `next_before` is the id of the last item when the page was full, so the
/// client can ask for `?before=<next_before>`.
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub items: Vec<T>,
    pub next_before: Option<String>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(items: Vec<T>, limit: i64, cursor: impl Fn(&T) -> &str) -> Self {
        let next_before = (items.len() as i64 >= limit)
            .then(|| items.last().map(|item| cursor(item).to_string()))
            .flatten();
        Self { items, next_before }
    }

    /// For lists that are not cursor-paged.
    pub fn all(items: Vec<T>) -> Self {
        Self {
            items,
            next_before: None,
        }
    }
}

/// Oldest-first list read with `?after=`
#[derive(Debug, Serialize)]
pub struct StreamResponse<T: Serialize> {
    pub items: Vec<T>,
    /// Id of the newest item returned; pass back as `after` to keep reading.
    pub next_after: Option<String>,
}

impl<T: Serialize> StreamResponse<T> {
    pub fn new(items: Vec<T>, after: Option<i64>, cursor: impl Fn(&T) -> &str) -> Self {
        let next_after = items
            .last()
            .map(|item| cursor(item).to_string())
            .or_else(|| after.map(|id| id.to_string()));
        Self { items, next_after }
    }
}

/// Count response (`{"count": n}`)
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

/// Friendship check between the caller and another user
#[derive(Debug, Serialize)]
pub struct FriendStatusResponse {
    pub user_id: String,
    pub friends: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: i64) -> UserSummaryDto {
        UserSummary {
            id,
            username: format!("user{id}"),
            display_name: None,
            avatar_url: None,
        }
        .into()
    }

    #[test]
    fn test_full_page_has_cursor() {
        let list = ListResponse::new(vec![summary(9), summary(7)], 2, |u| u.id.as_str());
        assert_eq!(list.next_before.as_deref(), Some("7"));
    }

    #[test]
    fn test_short_page_has_no_cursor() {
        let list = ListResponse::new(vec![summary(9)], 2, |u| u.id.as_str());
        assert_eq!(list.next_before, None);
    }

    #[test]
    fn test_empty_stream_keeps_cursor() {
        let list: StreamResponse<UserSummaryDto> = StreamResponse::new(vec![], Some(42), |u| u.id.as_str());
        assert_eq!(list.next_after.as_deref(), Some("42"));

        let list = StreamResponse::new(vec![summary(43), summary(44)], Some(42), |u| u.id.as_str());
        assert_eq!(list.next_after.as_deref(), Some("44"));
    }

    #[test]
    fn test_auth_response_flattens_tokens() {
        let tokens = AuthTokens {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 900,
            token_type: "Bearer".into(),
        };
        let user = UserDto::from_user(crate::domain::User::new(1, "ada", "ada@x.io", None), true);
        let json = serde_json::to_value(AuthResponse::new(user, tokens)).unwrap();
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["user"]["username"], "ada");
    }
}
