//! User Handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::application::dto::request::{PublicKeyRequest, SearchQuery, UpdateProfileRequest};
use crate::application::dto::response::ListResponse;
use crate::application::services::{PublicKeyDto, UpdateProfileDto, UserDto, UserService};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Get current authenticated user with follow counts
pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserDto>, AppError> {
    let user = state.user_service().get_me(auth.user_id).await?;
    Ok(Json(user))
}

/// Update current user profile
pub async fn update_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<UserDto>, AppError> {
    validate(&body)?;

    let update = UpdateProfileDto {
        username: body.username,
        display_name: body.display_name,
        bio: body.bio,
        avatar_url: body.avatar_url,
        location: body.location,
        website: body.website,
    };

    let user = state
        .user_service()
        .update_profile(auth.user_id, update)
        .await?;
    Ok(Json(user))
}

/// Get user by ID (public view)
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserDto>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let user = state.user_service().get_user(user_id).await?;
    Ok(Json(user))
}

/// Search users by username or display name
pub async fn search_users(
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<UserDto>>, AppError> {
    let page = page.page()?;
    let users = state.user_service().search(search.term(), page).await?;
    Ok(Json(ListResponse::new(users, page.limit, |u| u.id.as_str())))
}

/// Publish the caller's E2EE public key
pub async fn set_public_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PublicKeyRequest>,
) -> Result<Json<PublicKeyDto>, AppError> {
    validate(&body)?;
    let key = state
        .user_service()
        .set_public_key(auth.user_id, body.public_key.trim())
        .await?;
    Ok(Json(key))
}

/// Fetch a user's published E2EE public key
pub async fn get_public_key(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicKeyDto>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let key = state.user_service().get_public_key(user_id).await?;
    Ok(Json(key))
}
