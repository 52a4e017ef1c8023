//! Message Service
//!
//! Direct messages between friends. A body is either plaintext or an E2EE
//! envelope; ciphertext is stored and returned verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::domain::{
    E2eeEnvelope, Message, MessageBody, MessageBodyError, MessageRepository, SocialGraph,
    UserPair,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Send a message to a friend
    async fn send_message(&self, sender_id: i64, recipient_id: i64, request: CreateMessageDto) -> Result<MessageDto, MessageError>;

    /// Messages exchanged with one peer, newest first
    async fn get_conversation(&self, user_id: i64, peer_id: i64, page: Page) -> Result<Vec<MessageDto>, MessageError>;

    /// Latest message and unread count per peer
    async fn list_conversations(&self, user_id: i64, limit: i64) -> Result<Vec<ConversationDto>, MessageError>;

    /// Mark everything the peer sent as read
    async fn mark_read(&self, user_id: i64, peer_id: i64) -> Result<u64, MessageError>;

    /// Delete a message (sender only); a tombstone remains
    async fn delete_message(&self, user_id: i64, message_id: i64) -> Result<(), MessageError>;
}

/// Create message request
#[derive(Debug, Clone, Default)]
pub struct CreateMessageDto {
    pub content: Option<String>,
    pub envelope: Option<E2eeEnvelope>,
}

/// Message data transfer object
#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: MessageBody,
    pub read_at: Option<String>,
    pub deleted: bool,
    pub created_at: String,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.to_string(),
            sender_id: message.sender_id.to_string(),
            recipient_id: message.recipient_id.to_string(),
            deleted: message.deleted_at.is_some(),
            body: message.body,
            read_at: message.read_at.map(|t| t.to_rfc3339()),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDto {
    pub peer_id: String,
    pub last_message: MessageDto,
    pub unread_count: i64,
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message not found")]
    NotFound,

    #[error("You can only message friends")]
    NotFriends,

    #[error("You cannot message yourself")]
    SelfMessage,

    #[error("Only the sender can delete a message")]
    NotSender,

    #[error("Message must be 1 to {MAX_MESSAGE_CHARS} characters")]
    ContentLength,

    #[error("Envelope field {0} must be non-empty base64")]
    InvalidEnvelope(&'static str),

    #[error(transparent)]
    Body(#[from] MessageBodyError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<MessageError> for AppError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::NotFound => AppError::NotFound(err.to_string()),
            MessageError::NotFriends | MessageError::NotSender => {
                AppError::Forbidden(err.to_string())
            }
            MessageError::SelfMessage => AppError::BadRequest(err.to_string()),
            MessageError::ContentLength => AppError::field("content", err.to_string()),
            MessageError::InvalidEnvelope(field) => AppError::field(field, err.to_string()),
            MessageError::Body(e) => AppError::field("body", e.to_string()),
            MessageError::Store(e) => e,
        }
    }
}

fn check_envelope(envelope: &E2eeEnvelope) -> Result<(), MessageError> {
    let fields = [
        ("ciphertext", &envelope.ciphertext),
        ("nonce", &envelope.nonce),
        ("sender_public_key", &envelope.sender_public_key),
    ];
    for (name, value) in fields {
        if value.is_empty() || STANDARD.decode(value).is_err() {
            return Err(MessageError::InvalidEnvelope(name));
        }
    }
    if envelope.algorithm.trim().is_empty() {
        return Err(MessageError::InvalidEnvelope("algorithm"));
    }
    Ok(())
}

/// Build a validated body from the request parts.
pub fn message_body(request: CreateMessageDto) -> Result<MessageBody, MessageError> {
    let body = MessageBody::from_parts(request.content, request.envelope)?;
    match &body {
        MessageBody::Plain { content } => {
            let chars = content.trim().chars().count();
            if chars == 0 || chars > MAX_MESSAGE_CHARS {
                return Err(MessageError::ContentLength);
            }
        }
        MessageBody::Encrypted(envelope) => check_envelope(envelope)?,
        MessageBody::Deleted => return Err(MessageError::Body(MessageBodyError::Missing)),
    }
    Ok(body)
}

/// MessageService implementation
pub struct MessageServiceImpl<M, G>
where
    M: MessageRepository,
    G: SocialGraph,
{
    message_repo: Arc<M>,
    graph: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<M, G> MessageServiceImpl<M, G>
where
    M: MessageRepository,
    G: SocialGraph,
{
    pub fn new(message_repo: Arc<M>, graph: Arc<G>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            message_repo,
            graph,
            id_generator,
        }
    }
}

fn pair(a: i64, b: i64) -> Result<UserPair, MessageError> {
    UserPair::new(a, b).map_err(|_| MessageError::SelfMessage)
}

#[async_trait]
impl<M, G> MessageService for MessageServiceImpl<M, G>
where
    M: MessageRepository + 'static,
    G: SocialGraph + 'static,
{
    async fn send_message(&self, sender_id: i64, recipient_id: i64, request: CreateMessageDto) -> Result<MessageDto, MessageError> {
        let pair = pair(sender_id, recipient_id)?;
        let body = message_body(request)?;

        if !self.graph.are_friends(pair).await? {
            return Err(MessageError::NotFriends);
        }

        let message = Message::new(self.id_generator.generate(), sender_id, recipient_id, body);
        let created = self.message_repo.create(&message).await?;

        Ok(MessageDto::from(created))
    }

    async fn get_conversation(&self, user_id: i64, peer_id: i64, page: Page) -> Result<Vec<MessageDto>, MessageError> {
        let pair = pair(user_id, peer_id)?;
        let messages = self
            .message_repo
            .list_between(pair, page.before, page.limit)
            .await?;

        Ok(messages.into_iter().map(MessageDto::from).collect())
    }

    async fn list_conversations(&self, user_id: i64, limit: i64) -> Result<Vec<ConversationDto>, MessageError> {
        let summaries = self.message_repo.conversations(user_id, limit).await?;

        Ok(summaries
            .into_iter()
            .map(|s| ConversationDto {
                peer_id: s.peer_id.to_string(),
                last_message: s.last_message.into(),
                unread_count: s.unread_count,
            })
            .collect())
    }

    async fn mark_read(&self, user_id: i64, peer_id: i64) -> Result<u64, MessageError> {
        let pair = pair(user_id, peer_id)?;
        Ok(self.message_repo.mark_read(user_id, pair).await?)
    }

    async fn delete_message(&self, user_id: i64, message_id: i64) -> Result<(), MessageError> {
        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .filter(|m| m.sender_id == user_id || m.recipient_id == user_id)
            .ok_or(MessageError::NotFound)?;

        if message.sender_id != user_id {
            return Err(MessageError::NotSender);
        }
        if message.deleted_at.is_some() {
            return Ok(());
        }

        self.message_repo.soft_delete(message_id).await?;
        Ok(())
    }
}
