//! Circle Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{CircleRequest, UserIdRequest};
use crate::application::dto::response::ListResponse;
use crate::application::services::{
    CircleDto, CircleInput, CircleMemberDto, CircleService, MemoryDto, MemoryService,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

impl From<CircleRequest> for CircleInput {
    fn from(body: CircleRequest) -> Self {
        Self {
            name: body.name,
            description: body.description,
        }
    }
}

/// Create a circle owned by the caller
pub async fn create_circle(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CircleRequest>,
) -> Result<(StatusCode, Json<CircleDto>), AppError> {
    validate(&body)?;
    let circle = state
        .circle_service()
        .create(auth.user_id, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(circle)))
}

/// Circles the caller belongs to
pub async fn my_circles(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ListResponse<CircleDto>>, AppError> {
    let circles = state.circle_service().my_circles(auth.user_id).await?;
    Ok(Json(ListResponse::all(circles)))
}

pub async fn get_circle(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circle_id): Path<String>,
) -> Result<Json<CircleDto>, AppError> {
    let circle_id = parse_id(&circle_id, "circle")?;
    let circle = state.circle_service().get(auth.user_id, circle_id).await?;
    Ok(Json(circle))
}

pub async fn update_circle(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circle_id): Path<String>,
    Json(body): Json<CircleRequest>,
) -> Result<Json<CircleDto>, AppError> {
    validate(&body)?;
    let circle_id = parse_id(&circle_id, "circle")?;
    let circle = state
        .circle_service()
        .update(auth.user_id, circle_id, body.into())
        .await?;
    Ok(Json(circle))
}

pub async fn delete_circle(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circle_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let circle_id = parse_id(&circle_id, "circle")?;
    state.circle_service().delete(auth.user_id, circle_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circle_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<CircleMemberDto>>, AppError> {
    let circle_id = parse_id(&circle_id, "circle")?;
    let page = page.page()?;
    let members = state
        .circle_service()
        .members(auth.user_id, circle_id, page)
        .await?;
    Ok(Json(ListResponse::new(members, page.limit, |m| {
        m.user_id.as_str()
    })))
}

/// Owner adds a member
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circle_id): Path<String>,
    Json(body): Json<UserIdRequest>,
) -> Result<(StatusCode, Json<CircleMemberDto>), AppError> {
    validate(&body)?;
    let circle_id = parse_id(&circle_id, "circle")?;
    let member_id = parse_id(&body.user_id, "user")?;
    let member = state
        .circle_service()
        .add_member(auth.user_id, circle_id, member_id)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Owner removes a member, or a member leaves
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((circle_id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let circle_id = parse_id(&circle_id, "circle")?;
    let member_id = parse_id(&user_id, "user")?;
    state
        .circle_service()
        .remove_member(auth.user_id, circle_id, member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Circle-scoped memories, newest first
pub async fn circle_feed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(circle_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<MemoryDto>>, AppError> {
    let circle_id = parse_id(&circle_id, "circle")?;
    let page = page.page()?;
    let memories = state
        .memory_service()
        .circle_feed(auth.user_id, circle_id, page)
        .await?;
    Ok(Json(ListResponse::new(memories, page.limit, |m| m.id.as_str())))
}
