//! Call Service
//!
//! One-to-one call sessions between friends, signaled over REST polling.
//! Status changes go through a compare-and-set so concurrent answers and
//! hangups cannot both win.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::application::dto::response::SignalDto;
use crate::domain::{
    CallKind, CallRepository, CallSession, CallStart, CallStatus, Signal, SignalChannel, SignalKind,
    SignalRepository, SocialGraph, UserPair,
};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

/// Serialized signal payloads above this size are rejected.
pub const MAX_SIGNAL_PAYLOAD_BYTES: usize = 64 * 1024;

#[async_trait]
pub trait CallService: Send + Sync {
    async fn start(&self, caller_id: i64, callee_id: i64, kind: CallKind) -> Result<CallDto, CallError>;

    async fn accept(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError>;

    async fn decline(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError>;

    async fn cancel(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError>;

    async fn end(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError>;

    async fn get(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError>;

    /// Calls currently ringing for the user.
    async fn incoming(&self, user_id: i64) -> Result<Vec<CallDto>, CallError>;

    async fn history(&self, user_id: i64, page: Page) -> Result<Vec<CallDto>, CallError>;

    async fn send_signal(
        &self,
        user_id: i64,
        call_id: i64,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<SignalDto, CallError>;

    async fn poll_signals(
        &self,
        user_id: i64,
        call_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<SignalDto>, CallError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct CallDto {
    pub id: String,
    pub caller_id: String,
    pub callee_id: String,
    pub kind: CallKind,
    pub status: CallStatus,
    pub created_at: String,
    pub answered_at: Option<String>,
    pub ended_at: Option<String>,
}

impl From<CallSession> for CallDto {
    fn from(call: CallSession) -> Self {
        Self {
            id: call.id.to_string(),
            caller_id: call.caller_id.to_string(),
            callee_id: call.callee_id.to_string(),
            kind: call.kind,
            status: call.status,
            created_at: call.created_at.to_rfc3339(),
            answered_at: call.answered_at.map(|t| t.to_rfc3339()),
            ended_at: call.ended_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Call not found")]
    NotFound,

    #[error("You cannot call yourself")]
    SelfCall,

    #[error("You can only call friends")]
    NotFriends,

    #[error("You are already in a call")]
    Busy,

    #[error("The user is already in a call")]
    PeerBusy,

    #[error("Only the {0} can do this")]
    WrongParticipant(&'static str),

    #[error("Call cannot go from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Signal payload too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::NotFound => AppError::NotFound(err.to_string()),
            CallError::SelfCall => AppError::BadRequest(err.to_string()),
            CallError::NotFriends | CallError::WrongParticipant(_) => {
                AppError::Forbidden(err.to_string())
            }
            CallError::Busy | CallError::PeerBusy | CallError::InvalidTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            CallError::PayloadTooLarge => AppError::field("payload", err.to_string()),
            CallError::Store(e) => e,
        }
    }
}

pub struct CallServiceImpl<C, S, G>
where
    C: CallRepository,
    S: SignalRepository,
    G: SocialGraph,
{
    call_repo: Arc<C>,
    signal_repo: Arc<S>,
    graph: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
    ring_timeout: Duration,
}

impl<C, S, G> CallServiceImpl<C, S, G>
where
    C: CallRepository,
    S: SignalRepository,
    G: SocialGraph,
{
    pub fn new(
        call_repo: Arc<C>,
        signal_repo: Arc<S>,
        graph: Arc<G>,
        id_generator: Arc<SnowflakeGenerator>,
        ring_timeout: Duration,
    ) -> Self {
        Self {
            call_repo,
            signal_repo,
            graph,
            id_generator,
            ring_timeout,
        }
    }

    /// Load a call the user takes part in, observing an unanswered ring as missed.
    async fn load(&self, user_id: i64, call_id: i64) -> Result<CallSession, CallError> {
        let call = self
            .call_repo
            .find_by_id(call_id)
            .await?
            .filter(|c| c.is_participant(user_id))
            .ok_or(CallError::NotFound)?;

        let now = Utc::now();
        if call.ring_expired(now, self.ring_timeout) {
            debug!(call_id, "Ringing call timed out");
            return match self
                .call_repo
                .transition(call_id, CallStatus::Ringing, CallStatus::Missed, now)
                .await?
            {
                Some(missed) => Ok(missed),
                None => self
                    .call_repo
                    .find_by_id(call_id)
                    .await?
                    .ok_or(CallError::NotFound),
            };
        }
        Ok(call)
    }

    async fn move_to(&self, call: CallSession, to: CallStatus) -> Result<CallDto, CallError> {
        let invalid = CallError::InvalidTransition {
            from: call.status.as_str(),
            to: to.as_str(),
        };
        if !call.status.can_transition_to(to) {
            return Err(invalid);
        }

        let updated = self
            .call_repo
            .transition(call.id, call.status, to, Utc::now())
            .await?
            .ok_or(invalid)?;

        info!(call_id = updated.id, status = updated.status.as_str(), "Call status changed");
        Ok(updated.into())
    }

    async fn expire_stale(&self) -> Result<(), CallError> {
        let expired = self
            .call_repo
            .expire_ringing(Utc::now() - self.ring_timeout)
            .await?;
        if expired > 0 {
            debug!(expired, "Marked unanswered calls missed");
        }
        Ok(())
    }
}

#[async_trait]
impl<C, S, G> CallService for CallServiceImpl<C, S, G>
where
    C: CallRepository + 'static,
    S: SignalRepository + 'static,
    G: SocialGraph + 'static,
{
    async fn start(&self, caller_id: i64, callee_id: i64, kind: CallKind) -> Result<CallDto, CallError> {
        let pair = UserPair::new(caller_id, callee_id).map_err(|_| CallError::SelfCall)?;
        if !self.graph.are_friends(pair).await? {
            return Err(CallError::NotFriends);
        }

        self.expire_stale().await?;

        let call = CallSession::new(self.id_generator.generate(), caller_id, callee_id, kind);
        let created = match self.call_repo.start_if_idle(&call).await? {
            CallStart::Started(created) => created,
            CallStart::CallerBusy => return Err(CallError::Busy),
            CallStart::CalleeBusy => return Err(CallError::PeerBusy),
        };

        info!(call_id = created.id, caller_id, callee_id, "Call started");
        Ok(created.into())
    }

    async fn accept(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError> {
        let call = self.load(user_id, call_id).await?;
        if call.callee_id != user_id {
            return Err(CallError::WrongParticipant("callee"));
        }
        self.move_to(call, CallStatus::Active).await
    }

    async fn decline(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError> {
        let call = self.load(user_id, call_id).await?;
        if call.callee_id != user_id {
            return Err(CallError::WrongParticipant("callee"));
        }
        self.move_to(call, CallStatus::Declined).await
    }

    async fn cancel(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError> {
        let call = self.load(user_id, call_id).await?;
        if call.caller_id != user_id {
            return Err(CallError::WrongParticipant("caller"));
        }
        self.move_to(call, CallStatus::Cancelled).await
    }

    async fn end(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError> {
        let call = self.load(user_id, call_id).await?;
        self.move_to(call, CallStatus::Ended).await
    }

    async fn get(&self, user_id: i64, call_id: i64) -> Result<CallDto, CallError> {
        Ok(self.load(user_id, call_id).await?.into())
    }

    async fn incoming(&self, user_id: i64) -> Result<Vec<CallDto>, CallError> {
        self.expire_stale().await?;
        let calls = self.call_repo.incoming_ringing(user_id).await?;
        Ok(calls.into_iter().map(CallDto::from).collect())
    }

    async fn history(&self, user_id: i64, page: Page) -> Result<Vec<CallDto>, CallError> {
        let calls = self
            .call_repo
            .history(user_id, page.before, page.limit)
            .await?;
        Ok(calls.into_iter().map(CallDto::from).collect())
    }

    async fn send_signal(
        &self,
        user_id: i64,
        call_id: i64,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<SignalDto, CallError> {
        if payload.to_string().len() > MAX_SIGNAL_PAYLOAD_BYTES {
            return Err(CallError::PayloadTooLarge);
        }

        let call = self.load(user_id, call_id).await?;
        if call.status.is_terminal() {
            return Err(CallError::InvalidTransition {
                from: call.status.as_str(),
                to: "signal",
            });
        }

        let signal = Signal {
            id: self.id_generator.generate(),
            channel: SignalChannel::Call,
            channel_id: call.id,
            sender_id: user_id,
            recipient_id: Some(call.peer_of(user_id)),
            kind,
            payload,
            created_at: Utc::now(),
        };
        Ok(self.signal_repo.create(&signal).await?.into())
    }

    async fn poll_signals(
        &self,
        user_id: i64,
        call_id: i64,
        after: Option<i64>,
        limit: i64,
    ) -> Result<Vec<SignalDto>, CallError> {
        // Participants may drain signals after hangup
        self.call_repo
            .find_by_id(call_id)
            .await?
            .filter(|c| c.is_participant(user_id))
            .ok_or(CallError::NotFound)?;

        let signals = self
            .signal_repo
            .poll(SignalChannel::Call, call_id, user_id, after, limit)
            .await?;
        Ok(signals.into_iter().map(SignalDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockCallRepository, MockSignalRepository, MockSocialGraph};

    const CALLER: i64 = 1;
    const CALLEE: i64 = 2;

    type Svc = CallServiceImpl<MockCallRepository, MockSignalRepository, MockSocialGraph>;

    fn service(calls: MockCallRepository, signals: MockSignalRepository, friends: bool) -> Svc {
        let mut graph = MockSocialGraph::new();
        graph.expect_are_friends().returning(move |_| Ok(friends));
        CallServiceImpl::new(
            Arc::new(calls),
            Arc::new(signals),
            Arc::new(graph),
            Arc::new(SnowflakeGenerator::new(1, 1)),
            Duration::seconds(45),
        )
    }

    fn ringing(id: i64) -> CallSession {
        CallSession::new(id, CALLER, CALLEE, CallKind::Audio)
    }

    fn with_status(mut call: CallSession, status: CallStatus) -> CallSession {
        call.status = status;
        call
    }

    #[tokio::test]
    async fn test_start_requires_friendship() {
        let err = service(MockCallRepository::new(), MockSignalRepository::new(), false)
            .start(CALLER, CALLEE, CallKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::NotFriends));
    }

    #[tokio::test]
    async fn test_start_while_in_call_conflicts() {
        let mut calls = MockCallRepository::new();
        calls.expect_expire_ringing().returning(|_| Ok(0));
        calls.expect_start_if_idle()
            .times(1)
            .returning(|_| Ok(CallStart::CallerBusy));

        let err = service(calls, MockSignalRepository::new(), true)
            .start(CALLER, CALLEE, CallKind::Audio)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Busy));
        assert_eq!(AppError::from(err).status(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_start_to_busy_callee_conflicts() {
        let mut calls = MockCallRepository::new();
        calls.expect_expire_ringing().returning(|_| Ok(0));
        calls.expect_start_if_idle()
            .returning(|_| Ok(CallStart::CalleeBusy));

        let err = service(calls, MockSignalRepository::new(), true)
            .start(CALLER, CALLEE, CallKind::Audio)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::PeerBusy));
    }

    #[tokio::test]
    async fn test_start_creates_ringing_call() {
        let mut calls = MockCallRepository::new();
        calls.expect_expire_ringing().returning(|_| Ok(0));
        calls.expect_start_if_idle()
            .withf(|c| c.caller_id == CALLER && c.callee_id == CALLEE && c.status == CallStatus::Ringing)
            .returning(|c| Ok(CallStart::Started(c.clone())));

        let dto = service(calls, MockSignalRepository::new(), true)
            .start(CALLER, CALLEE, CallKind::Video)
            .await
            .unwrap();
        assert_eq!(dto.status, CallStatus::Ringing);
        assert_eq!(dto.kind, CallKind::Video);
    }

    #[tokio::test]
    async fn test_only_callee_accepts() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id().returning(|id| Ok(Some(ringing(id))));
        calls.expect_transition().never();

        let err = service(calls, MockSignalRepository::new(), true)
            .accept(CALLER, 9)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::WrongParticipant("callee")));
    }

    #[tokio::test]
    async fn test_accept_uses_compare_and_set() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id().returning(|id| Ok(Some(ringing(id))));
        calls.expect_transition()
            .withf(|_, from, to, _| *from == CallStatus::Ringing && *to == CallStatus::Active)
            .returning(|id, _, to, _| Ok(Some(with_status(ringing(id), to))));

        let dto = service(calls, MockSignalRepository::new(), true)
            .accept(CALLEE, 9)
            .await
            .unwrap();
        assert_eq!(dto.status, CallStatus::Active);
    }

    #[tokio::test]
    async fn test_lost_race_is_conflict() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id().returning(|id| Ok(Some(ringing(id))));
        calls.expect_transition().returning(|_, _, _, _| Ok(None));

        let err = service(calls, MockSignalRepository::new(), true)
            .cancel(CALLER, 9)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_ending_a_ringing_call_is_invalid() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id().returning(|id| Ok(Some(ringing(id))));

        let err = service(calls, MockSignalRepository::new(), true)
            .end(CALLER, 9)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CallError::InvalidTransition {
                from: "ringing",
                to: "ended"
            }
        ));
    }

    #[tokio::test]
    async fn test_stale_ring_observed_as_missed() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id().returning(|id| {
            let mut call = ringing(id);
            call.created_at = Utc::now() - Duration::minutes(5);
            Ok(Some(call))
        });
        calls.expect_transition()
            .withf(|_, from, to, _| *from == CallStatus::Ringing && *to == CallStatus::Missed)
            .returning(|id, _, to, _| Ok(Some(with_status(ringing(id), to))));

        let dto = service(calls, MockSignalRepository::new(), true)
            .get(CALLEE, 9)
            .await
            .unwrap();
        assert_eq!(dto.status, CallStatus::Missed);
    }

    #[tokio::test]
    async fn test_signal_addressed_to_peer() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id()
            .returning(|id| Ok(Some(with_status(ringing(id), CallStatus::Active))));
        let mut signals = MockSignalRepository::new();
        signals
            .expect_create()
            .withf(|s| s.recipient_id == Some(CALLEE) && s.kind == SignalKind::Offer)
            .returning(|s| Ok(s.clone()));

        let dto = service(calls, signals, true)
            .send_signal(CALLER, 9, SignalKind::Offer, serde_json::json!({"sdp": "v=0"}))
            .await
            .unwrap();
        assert_eq!(dto.sender_id, "1");
    }

    #[tokio::test]
    async fn test_no_signals_after_hangup() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id()
            .returning(|id| Ok(Some(with_status(ringing(id), CallStatus::Ended))));

        let err = service(calls, MockSignalRepository::new(), true)
            .send_signal(CALLER, 9, SignalKind::IceCandidate, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_outsider_cannot_poll() {
        let mut calls = MockCallRepository::new();
        calls.expect_find_by_id().returning(|id| Ok(Some(ringing(id))));

        let err = service(calls, MockSignalRepository::new(), true)
            .poll_signals(3, 9, None, 50)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::NotFound));
    }
}
