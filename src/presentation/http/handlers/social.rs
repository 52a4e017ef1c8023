//! Social Graph Handlers
//!
//! Follows, friendships and connections.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::UserIdRequest;
use crate::application::dto::response::{FriendStatusResponse, ListResponse, UserSummaryDto};
use crate::application::services::{
    ConnectionDto, ConnectionService, ConnectionStateDto, FollowService, FriendRequestDto,
    FriendshipService,
};
use crate::domain::FollowCounts;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

// ---------------------------------------------------------------------------
// Follows
// ---------------------------------------------------------------------------

pub async fn follow(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<FollowCounts>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let counts = state.follow_service().follow(auth.user_id, user_id).await?;
    Ok(Json(counts))
}

pub async fn unfollow(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<FollowCounts>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let counts = state.follow_service().unfollow(auth.user_id, user_id).await?;
    Ok(Json(counts))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<UserSummaryDto>>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let page = page.page()?;
    let users = state.follow_service().followers(user_id, page).await?;
    Ok(Json(ListResponse::new(users, page.limit, |u| u.id.as_str())))
}

pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<UserSummaryDto>>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let page = page.page()?;
    let users = state.follow_service().following(user_id, page).await?;
    Ok(Json(ListResponse::new(users, page.limit, |u| u.id.as_str())))
}

// ---------------------------------------------------------------------------
// Friendships
// ---------------------------------------------------------------------------

/// Send a friend request. A crossing pending request is accepted instead.
pub async fn send_friend_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UserIdRequest>,
) -> Result<(StatusCode, Json<FriendRequestDto>), AppError> {
    validate(&body)?;
    let recipient_id = parse_id(&body.user_id, "user")?;
    let request = state
        .friendship_service()
        .send_request(auth.user_id, recipient_id)
        .await?;

    let status = if request.status == "pending" {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(request)))
}

pub async fn incoming_friend_requests(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<FriendRequestDto>>, AppError> {
    let page = page.page()?;
    let requests = state
        .friendship_service()
        .incoming(auth.user_id, page)
        .await?;
    Ok(Json(ListResponse::new(requests, page.limit, |r| r.id.as_str())))
}

pub async fn outgoing_friend_requests(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<FriendRequestDto>>, AppError> {
    let page = page.page()?;
    let requests = state
        .friendship_service()
        .outgoing(auth.user_id, page)
        .await?;
    Ok(Json(ListResponse::new(requests, page.limit, |r| r.id.as_str())))
}

pub async fn accept_friend_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<String>,
) -> Result<Json<FriendRequestDto>, AppError> {
    let request_id = parse_id(&request_id, "request")?;
    let request = state
        .friendship_service()
        .accept(auth.user_id, request_id)
        .await?;
    Ok(Json(request))
}

pub async fn decline_friend_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let request_id = parse_id(&request_id, "request")?;
    state
        .friendship_service()
        .decline(auth.user_id, request_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_friend_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let request_id = parse_id(&request_id, "request")?;
    state
        .friendship_service()
        .cancel(auth.user_id, request_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_friends(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<UserSummaryDto>>, AppError> {
    let page = page.page()?;
    let friends = state
        .friendship_service()
        .list_friends(auth.user_id, page)
        .await?;
    Ok(Json(ListResponse::new(friends, page.limit, |u| u.id.as_str())))
}

pub async fn unfriend(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    state
        .friendship_service()
        .unfriend(auth.user_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn friend_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<FriendStatusResponse>, AppError> {
    let other_id = parse_id(&user_id, "user")?;
    let friends = state
        .friendship_service()
        .are_friends(auth.user_id, other_id)
        .await?;
    Ok(Json(FriendStatusResponse {
        user_id: other_id.to_string(),
        friends,
    }))
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

pub async fn request_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<ConnectionDto>), AppError> {
    let peer_id = parse_id(&user_id, "user")?;
    let connection = state
        .connection_service()
        .request(auth.user_id, peer_id)
        .await?;

    let status = if connection.status == "pending" {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(connection)))
}

pub async fn accept_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<ConnectionDto>, AppError> {
    let peer_id = parse_id(&user_id, "user")?;
    let connection = state
        .connection_service()
        .accept(auth.user_id, peer_id)
        .await?;
    Ok(Json(connection))
}

/// Withdraw, decline or sever a connection
pub async fn remove_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let peer_id = parse_id(&user_id, "user")?;
    state
        .connection_service()
        .remove(auth.user_id, peer_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_connections(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<UserSummaryDto>>, AppError> {
    let page = page.page()?;
    let peers = state.connection_service().list(auth.user_id, page).await?;
    Ok(Json(ListResponse::new(peers, page.limit, |u| u.id.as_str())))
}

pub async fn incoming_connections(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<ConnectionDto>>, AppError> {
    let pending = state
        .connection_service()
        .incoming(auth.user_id, page.limit())
        .await?;
    Ok(Json(ListResponse::all(pending)))
}

pub async fn connection_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<ConnectionStateDto>, AppError> {
    let peer_id = parse_id(&user_id, "user")?;
    let status = state
        .connection_service()
        .status(auth.user_id, peer_id)
        .await?;
    Ok(Json(status))
}
