//! Call Handlers
//!
//! One-to-one call lifecycle plus the polled signaling relay.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{AfterQuery, SignalRequest, StartCallRequest};
use crate::application::dto::response::{ListResponse, SignalDto, StreamResponse};
use crate::application::services::{CallDto, CallService};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Ring a friend
pub async fn start_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<StartCallRequest>,
) -> Result<(StatusCode, Json<CallDto>), AppError> {
    validate(&body)?;
    let callee_id = parse_id(&body.callee_id, "callee")?;
    let call = state
        .call_service()
        .start(auth.user_id, callee_id, body.kind)
        .await?;
    Ok((StatusCode::CREATED, Json(call)))
}

/// Calls ringing for the caller right now
pub async fn incoming_calls(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ListResponse<CallDto>>, AppError> {
    let calls = state.call_service().incoming(auth.user_id).await?;
    Ok(Json(ListResponse::all(calls)))
}

pub async fn call_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<CallDto>>, AppError> {
    let page = page.page()?;
    let calls = state.call_service().history(auth.user_id, page).await?;
    Ok(Json(ListResponse::new(calls, page.limit, |c| c.id.as_str())))
}

pub async fn get_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(call_id): Path<String>,
) -> Result<Json<CallDto>, AppError> {
    let call_id = parse_id(&call_id, "call")?;
    let call = state.call_service().get(auth.user_id, call_id).await?;
    Ok(Json(call))
}

pub async fn accept_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(call_id): Path<String>,
) -> Result<Json<CallDto>, AppError> {
    let call_id = parse_id(&call_id, "call")?;
    let call = state.call_service().accept(auth.user_id, call_id).await?;
    Ok(Json(call))
}

pub async fn decline_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(call_id): Path<String>,
) -> Result<Json<CallDto>, AppError> {
    let call_id = parse_id(&call_id, "call")?;
    let call = state.call_service().decline(auth.user_id, call_id).await?;
    Ok(Json(call))
}

pub async fn cancel_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(call_id): Path<String>,
) -> Result<Json<CallDto>, AppError> {
    let call_id = parse_id(&call_id, "call")?;
    let call = state.call_service().cancel(auth.user_id, call_id).await?;
    Ok(Json(call))
}

pub async fn end_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(call_id): Path<String>,
) -> Result<Json<CallDto>, AppError> {
    let call_id = parse_id(&call_id, "call")?;
    let call = state.call_service().end(auth.user_id, call_id).await?;
    Ok(Json(call))
}

/// Relay an offer, answer or ICE candidate to the other party
pub async fn send_signal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(call_id): Path<String>,
    Json(body): Json<SignalRequest>,
) -> Result<(StatusCode, Json<SignalDto>), AppError> {
    let call_id = parse_id(&call_id, "call")?;
    let signal = state
        .call_service()
        .send_signal(auth.user_id, call_id, body.kind, body.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(signal)))
}

/// Signals addressed to the caller, oldest first
pub async fn poll_signals(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(call_id): Path<String>,
    Query(query): Query<AfterQuery>,
) -> Result<Json<StreamResponse<SignalDto>>, AppError> {
    let call_id = parse_id(&call_id, "call")?;
    let after = query.after()?;
    let signals = state
        .call_service()
        .poll_signals(auth.user_id, call_id, after, query.limit())
        .await?;
    Ok(Json(StreamResponse::new(signals, after, |s| s.id.as_str())))
}
