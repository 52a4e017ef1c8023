//! Message Repository Implementation
//!
//! Direct messages keyed by the canonical user pair. The E2EE envelope is
//! stored in dedicated columns and never interpreted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    ConversationSummary, E2eeEnvelope, Message, MessageBody, MessageRepository, UserPair,
};
use crate::shared::error::AppError;

const MESSAGE_COLUMNS: &str = r#"
    m.id, m.sender_id, m.recipient_id, m.content, m.ciphertext, m.nonce,
    m.sender_public_key, m.algorithm, m.read_at, m.deleted_at, m.created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    sender_id: i64,
    recipient_id: i64,
    content: Option<String>,
    ciphertext: Option<String>,
    nonce: Option<String>,
    sender_public_key: Option<String>,
    algorithm: Option<String>,
    read_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        let body = if self.deleted_at.is_some() {
            MessageBody::Deleted
        } else if let Some(content) = self.content {
            MessageBody::Plain { content }
        } else {
            match (
                self.ciphertext,
                self.nonce,
                self.sender_public_key,
                self.algorithm,
            ) {
                (Some(ciphertext), Some(nonce), Some(sender_public_key), Some(algorithm)) => {
                    MessageBody::Encrypted(E2eeEnvelope {
                        ciphertext,
                        nonce,
                        sender_public_key,
                        algorithm,
                    })
                }
                _ => MessageBody::Deleted,
            }
        };

        Message {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            body,
            read_at: self.read_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    #[sqlx(flatten)]
    message: MessageRow,
    unread_count: i64,
}

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &Message) -> Result<Message, AppError> {
        let pair = UserPair::new(message.sender_id, message.recipient_id)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let (content, envelope) = match &message.body {
            MessageBody::Plain { content } => (Some(content.as_str()), None),
            MessageBody::Encrypted(envelope) => (None, Some(envelope)),
            MessageBody::Deleted => {
                return Err(AppError::Internal("Cannot store a deleted message".into()))
            }
        };

        let sql = format!(
            r#"
            INSERT INTO messages AS m (id, sender_id, recipient_id, user_low_id, user_high_id,
                                       content, ciphertext, nonce, sender_public_key, algorithm)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MESSAGE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message.id)
            .bind(message.sender_id)
            .bind(message.recipient_id)
            .bind(pair.low())
            .bind(pair.high())
            .bind(content)
            .bind(envelope.map(|e| e.ciphertext.as_str()))
            .bind(envelope.map(|e| e.nonce.as_str()))
            .bind(envelope.map(|e| e.sender_public_key.as_str()))
            .bind(envelope.map(|e| e.algorithm.as_str()))
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into_message())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = $1");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn list_between(
        &self,
        pair: UserPair,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            WHERE m.user_low_id = $1 AND m.user_high_id = $2
              AND ($3::BIGINT IS NULL OR m.id < $3)
            ORDER BY m.id DESC
            LIMIT $4
            "#
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(pair.low())
            .bind(pair.high())
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn conversations(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let sql = format!(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (m.user_low_id, m.user_high_id)
                    {MESSAGE_COLUMNS},
                    (SELECT COUNT(*) FROM messages u
                     WHERE u.user_low_id = m.user_low_id AND u.user_high_id = m.user_high_id
                       AND u.recipient_id = $1 AND u.read_at IS NULL AND u.deleted_at IS NULL
                    ) AS unread_count
                FROM messages m
                WHERE m.user_low_id = $1 OR m.user_high_id = $1
                ORDER BY m.user_low_id, m.user_high_id, m.id DESC
            ) latest
            ORDER BY id DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, ConversationRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let last_message = row.message.into_message();
                ConversationSummary {
                    peer_id: last_message.peer_of(user_id),
                    last_message,
                    unread_count: row.unread_count,
                }
            })
            .collect())
    }

    async fn mark_read(&self, reader_id: i64, pair: UserPair) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = NOW()
            WHERE user_low_id = $1 AND user_high_id = $2
              AND recipient_id = $3 AND read_at IS NULL
            "#,
        )
        .bind(pair.low())
        .bind(pair.high())
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET content = NULL, ciphertext = NULL, nonce = NULL,
                sender_public_key = NULL, algorithm = NULL, deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
