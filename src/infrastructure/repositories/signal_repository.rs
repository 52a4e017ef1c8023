//! Signal Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Signal, SignalChannel, SignalKind, SignalRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct SignalRow {
    id: i64,
    channel_type: String,
    channel_id: i64,
    sender_id: i64,
    recipient_id: Option<i64>,
    kind: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl SignalRow {
    fn into_signal(self) -> Signal {
        Signal {
            id: self.id,
            channel: SignalChannel::from_str(&self.channel_type),
            channel_id: self.channel_id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            kind: SignalKind::from_str(&self.kind),
            payload: self.payload,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL signal repository implementation.
#[derive(Clone)]
pub struct PgSignalRepository {
    pool: PgPool,
}

impl PgSignalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for PgSignalRepository {
    async fn create(&self, signal: &Signal) -> Result<Signal, AppError> {
        let row = sqlx::query_as::<_, SignalRow>(
            r#"
            INSERT INTO signals (id, channel_type, channel_id, sender_id, recipient_id, kind, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, channel_type, channel_id, sender_id, recipient_id, kind, payload, created_at
            "#,
        )
        .bind(signal.id)
        .bind(signal.channel.as_str())
        .bind(signal.channel_id)
        .bind(signal.sender_id)
        .bind(signal.recipient_id)
        .bind(signal.kind.as_str())
        .bind(&signal.payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_signal())
    }

    async fn poll(
        &self,
        channel: SignalChannel,
        channel_id: i64,
        reader_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Signal>, AppError> {
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT id, channel_type, channel_id, sender_id, recipient_id, kind, payload, created_at
            FROM signals
            WHERE channel_type = $1 AND channel_id = $2
              AND sender_id <> $3
              AND (recipient_id IS NULL OR recipient_id = $3)
              AND ($4::BIGINT IS NULL OR id > $4)
            ORDER BY id ASC
            LIMIT $5
            "#,
        )
        .bind(channel.as_str())
        .bind(channel_id)
        .bind(reader_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SignalRow::into_signal).collect())
    }
}
