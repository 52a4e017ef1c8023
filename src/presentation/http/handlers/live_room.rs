//! Live Room Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{AfterQuery, CreateLiveRoomRequest, SignalRequest};
use crate::application::dto::response::{
    ListResponse, SignalDto, StreamResponse, UserSummaryDto,
};
use crate::application::services::{LiveRoomDto, LiveRoomService};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Go live
pub async fn create_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateLiveRoomRequest>,
) -> Result<(StatusCode, Json<LiveRoomDto>), AppError> {
    validate(&body)?;
    let room = state
        .live_room_service()
        .create(auth.user_id, body.title.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// Rooms currently live, newest first
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<LiveRoomDto>>, AppError> {
    let page = page.page()?;
    let rooms = state.live_room_service().list_live(page).await?;
    Ok(Json(ListResponse::new(rooms, page.limit, |r| r.id.as_str())))
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<LiveRoomDto>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let room = state.live_room_service().get(room_id).await?;
    Ok(Json(room))
}

pub async fn join_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<LiveRoomDto>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let room = state
        .live_room_service()
        .join(auth.user_id, room_id)
        .await?;
    Ok(Json(room))
}

pub async fn leave_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    state
        .live_room_service()
        .leave(auth.user_id, room_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Host ends the broadcast
pub async fn end_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<LiveRoomDto>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let room = state.live_room_service().end(auth.user_id, room_id).await?;
    Ok(Json(room))
}

pub async fn participants(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<UserSummaryDto>>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let page = page.page()?;
    let users = state
        .live_room_service()
        .participants(room_id, page)
        .await?;
    Ok(Json(ListResponse::new(users, page.limit, |u| u.id.as_str())))
}

/// Host broadcasts or addresses one viewer; viewers always reach the host
pub async fn send_signal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<SignalRequest>,
) -> Result<(StatusCode, Json<SignalDto>), AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let recipient_id = body
        .recipient_id
        .as_deref()
        .map(|id| parse_id(id, "recipient"))
        .transpose()?;

    let signal = state
        .live_room_service()
        .send_signal(auth.user_id, room_id, recipient_id, body.kind, body.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(signal)))
}

pub async fn poll_signals(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Query(query): Query<AfterQuery>,
) -> Result<Json<StreamResponse<SignalDto>>, AppError> {
    let room_id = parse_id(&room_id, "room")?;
    let after = query.after()?;
    let signals = state
        .live_room_service()
        .poll_signals(auth.user_id, room_id, after, query.limit())
        .await?;
    Ok(Json(StreamResponse::new(signals, after, |s| s.id.as_str())))
}
