//! Direct message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::UserPair;
use crate::shared::error::AppError;

/// Client-side encrypted payload. The server stores it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct E2eeEnvelope {
    /// Base64 ciphertext
    pub ciphertext: String,
    /// Base64 nonce
    pub nonce: String,
    /// Base64 sender public key used for the key agreement
    pub sender_public_key: String,
    /// Cipher suite label, e.g. `x25519-xsalsa20-poly1305`
    pub algorithm: String,
}

/// Message payload: plaintext or an E2EE envelope, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    Plain { content: String },
    Encrypted(E2eeEnvelope),
    /// Tombstone left after the sender deletes the message.
    Deleted,
}

/// Error for a request carrying both or neither body kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MessageBodyError {
    #[error("either content or an encrypted envelope is required")]
    Missing,
    #[error("content and an encrypted envelope are mutually exclusive")]
    Both,
}

impl MessageBody {
    pub fn from_parts(
        content: Option<String>,
        envelope: Option<E2eeEnvelope>,
    ) -> Result<Self, MessageBodyError> {
        match (content, envelope) {
            (Some(content), None) => Ok(Self::Plain { content }),
            (None, Some(envelope)) => Ok(Self::Encrypted(envelope)),
            (Some(_), Some(_)) => Err(MessageBodyError::Both),
            (None, None) => Err(MessageBodyError::Missing),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }
}

/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - sender_id / recipient_id: BIGINT NOT NULL REFERENCES users(id)
/// - user_low_id / user_high_id: BIGINT NOT NULL (conversation key)
/// - content: TEXT NULL
/// - ciphertext / nonce / sender_public_key / algorithm: NULL unless encrypted
/// - read_at / deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub body: MessageBody,
    pub read_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(id: i64, sender_id: i64, recipient_id: i64, body: MessageBody) -> Self {
        Self {
            id,
            sender_id,
            recipient_id,
            body,
            read_at: None,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn peer_of(&self, user_id: i64) -> i64 {
        if self.sender_id == user_id {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

/// Latest message with one peer plus the unread count for the viewer.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub peer_id: i64,
    pub last_message: Message,
    pub unread_count: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &Message) -> Result<Message, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Messages between the pair, newest first.
    async fn list_between(
        &self,
        pair: UserPair,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// One entry per peer, most recent conversation first.
    async fn conversations(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>, AppError>;

    /// Mark every unread message addressed to `reader_id` in the pair read.
    async fn mark_read(&self, reader_id: i64, pair: UserPair) -> Result<u64, AppError>;

    /// Clear the body and set `deleted_at`.
    async fn soft_delete(&self, id: i64) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> E2eeEnvelope {
        E2eeEnvelope {
            ciphertext: "Y2lwaGVy".into(),
            nonce: "bm9uY2U=".into(),
            sender_public_key: "a2V5".into(),
            algorithm: "x25519-xsalsa20-poly1305".into(),
        }
    }

    #[test]
    fn test_body_requires_exactly_one_kind() {
        assert_eq!(
            MessageBody::from_parts(Some("hi".into()), None),
            Ok(MessageBody::Plain {
                content: "hi".into()
            })
        );
        assert!(MessageBody::from_parts(None, Some(envelope()))
            .unwrap()
            .is_encrypted());
        assert_eq!(
            MessageBody::from_parts(Some("hi".into()), Some(envelope())),
            Err(MessageBodyError::Both)
        );
        assert_eq!(
            MessageBody::from_parts(None, None),
            Err(MessageBodyError::Missing)
        );
    }

    #[test]
    fn test_body_serialization_is_tagged() {
        let json = serde_json::to_value(MessageBody::Encrypted(envelope())).unwrap();
        assert_eq!(json["type"], "encrypted");
        assert_eq!(json["nonce"], "bm9uY2U=");

        let json = serde_json::to_value(MessageBody::Deleted).unwrap();
        assert_eq!(json, serde_json::json!({"type": "deleted"}));
    }

    #[test]
    fn test_peer_of() {
        let message = Message::new(1, 10, 20, MessageBody::Deleted);
        assert_eq!(message.peer_of(10), 20);
        assert_eq!(message.peer_of(20), 10);
    }
}
