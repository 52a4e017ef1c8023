//! Call Session Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{CallKind, CallRepository, CallSession, CallStart, CallStatus};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: i64,
    caller_id: i64,
    callee_id: i64,
    kind: String,
    status: String,
    created_at: DateTime<Utc>,
    answered_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl CallRow {
    fn into_call(self) -> CallSession {
        CallSession {
            id: self.id,
            caller_id: self.caller_id,
            callee_id: self.callee_id,
            kind: CallKind::from_str(&self.kind),
            status: CallStatus::from_str(&self.status),
            created_at: self.created_at,
            answered_at: self.answered_at,
            ended_at: self.ended_at,
        }
    }
}

/// PostgreSQL call session repository implementation.
#[derive(Clone)]
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallRepository for PgCallRepository {
    async fn start_if_idle(&self, call: &CallSession) -> Result<CallStart, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lowest id first so two starts between the same users cannot deadlock
        let mut participants = [call.caller_id, call.callee_id];
        participants.sort_unstable();
        for user_id in participants {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let busy: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT u.id
            FROM UNNEST($1::BIGINT[]) AS u(id)
            WHERE EXISTS (
                SELECT 1 FROM call_sessions c
                WHERE (c.caller_id = u.id OR c.callee_id = u.id)
                  AND c.status IN ('ringing', 'active')
            )
            "#,
        )
        .bind(&participants[..])
        .fetch_all(&mut *tx)
        .await?;

        if busy.contains(&call.caller_id) {
            tx.rollback().await?;
            return Ok(CallStart::CallerBusy);
        }
        if busy.contains(&call.callee_id) {
            tx.rollback().await?;
            return Ok(CallStart::CalleeBusy);
        }

        let row = sqlx::query_as::<_, CallRow>(
            r#"
            INSERT INTO call_sessions (id, caller_id, callee_id, kind, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, caller_id, callee_id, kind, status, created_at, answered_at, ended_at
            "#,
        )
        .bind(call.id)
        .bind(call.caller_id)
        .bind(call.callee_id)
        .bind(call.kind.as_str())
        .bind(call.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CallStart::Started(row.into_call()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CallSession>, AppError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT id, caller_id, callee_id, kind, status, created_at, answered_at, ended_at
            FROM call_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CallRow::into_call))
    }

    async fn transition(
        &self,
        id: i64,
        from: CallStatus,
        to: CallStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CallSession>, AppError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            UPDATE call_sessions
            SET status = $3,
                answered_at = CASE WHEN $3 = 'active' THEN $4 ELSE answered_at END,
                ended_at = CASE WHEN $3 <> 'active' THEN $4 ELSE ended_at END
            WHERE id = $1 AND status = $2
            RETURNING id, caller_id, callee_id, kind, status, created_at, answered_at, ended_at
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CallRow::into_call))
    }

    async fn expire_ringing(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE call_sessions SET status = 'missed', ended_at = NOW()
            WHERE status = 'ringing' AND created_at <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn incoming_ringing(&self, callee_id: i64) -> Result<Vec<CallSession>, AppError> {
        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT id, caller_id, callee_id, kind, status, created_at, answered_at, ended_at
            FROM call_sessions
            WHERE callee_id = $1 AND status = 'ringing'
            ORDER BY id DESC
            "#,
        )
        .bind(callee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CallRow::into_call).collect())
    }

    async fn history(
        &self,
        user_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<CallSession>, AppError> {
        let rows = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT id, caller_id, callee_id, kind, status, created_at, answered_at, ended_at
            FROM call_sessions
            WHERE (caller_id = $1 OR callee_id = $1)
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CallRow::into_call).collect())
    }
}
