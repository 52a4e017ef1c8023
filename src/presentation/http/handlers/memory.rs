//! Memory Handlers
//!
//! Posting, feeds, comments, hearts, the vault and reshares.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{
    AdoptRequest, AfterQuery, CommentRequest, CreateMemoryRequest, ReshareRequest, SearchQuery,
};
use crate::application::dto::response::{ListResponse, StreamResponse};
use crate::application::services::{
    CommentDto, CreateMemoryInput, MemoryDto, MemoryService, ReshareInput, VaultItemDto,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Post a memory
pub async fn create_memory(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateMemoryRequest>,
) -> Result<(StatusCode, Json<MemoryDto>), AppError> {
    validate(&body)?;

    let input = CreateMemoryInput {
        scope: body.scope,
        body: body.body,
        media_urls: body.media_urls,
        circle_id: body
            .circle_id
            .as_deref()
            .map(|id| parse_id(id, "circle"))
            .transpose()?,
        recipient_id: body
            .recipient_id
            .as_deref()
            .map(|id| parse_id(id, "recipient"))
            .transpose()?,
    };

    let memory = state.memory_service().create(auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(memory)))
}

pub async fn get_memory(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
) -> Result<Json<MemoryDto>, AppError> {
    let memory_id = parse_id(&memory_id, "memory")?;
    let memory = state.memory_service().get(auth.user_id, memory_id).await?;
    Ok(Json(memory))
}

/// Author soft-deletes a memory
pub async fn delete_memory(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let memory_id = parse_id(&memory_id, "memory")?;
    state.memory_service().delete(auth.user_id, memory_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A user's memories as the caller may see them
pub async fn user_timeline(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<MemoryDto>>, AppError> {
    let author_id = parse_id(&user_id, "user")?;
    let page = page.page()?;
    let memories = state
        .memory_service()
        .timeline(auth.user_id, author_id, page)
        .await?;
    Ok(Json(ListResponse::new(memories, page.limit, |m| m.id.as_str())))
}

pub async fn home_feed(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<MemoryDto>>, AppError> {
    let page = page.page()?;
    let memories = state.memory_service().home_feed(auth.user_id, page).await?;
    Ok(Json(ListResponse::new(memories, page.limit, |m| m.id.as_str())))
}

/// Unexpired stories from people the caller follows
pub async fn stories(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<MemoryDto>>, AppError> {
    let page = page.page()?;
    let memories = state.memory_service().stories(auth.user_id, page).await?;
    Ok(Json(ListResponse::new(memories, page.limit, |m| m.id.as_str())))
}

pub async fn search_memories(
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<MemoryDto>>, AppError> {
    let page = page.page()?;
    let memories = state.memory_service().search(search.term(), page).await?;
    Ok(Json(ListResponse::new(memories, page.limit, |m| m.id.as_str())))
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

pub async fn add_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentDto>), AppError> {
    validate(&body)?;
    let memory_id = parse_id(&memory_id, "memory")?;
    let comment = state
        .memory_service()
        .add_comment(auth.user_id, memory_id, body.body.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Comments oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
    Query(query): Query<AfterQuery>,
) -> Result<Json<StreamResponse<CommentDto>>, AppError> {
    let memory_id = parse_id(&memory_id, "memory")?;
    let after = query.after()?;
    let comments = state
        .memory_service()
        .list_comments(auth.user_id, memory_id, after, query.limit())
        .await?;
    Ok(Json(StreamResponse::new(comments, after, |c| c.id.as_str())))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let comment_id = parse_id(&comment_id, "comment")?;
    state
        .memory_service()
        .delete_comment(auth.user_id, comment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Hearts, vault and reshares
// ---------------------------------------------------------------------------

pub async fn heart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let memory_id = parse_id(&memory_id, "memory")?;
    state.memory_service().heart(auth.user_id, memory_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unheart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let memory_id = parse_id(&memory_id, "memory")?;
    state.memory_service().unheart(auth.user_id, memory_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Save a memory to the caller's vault. 201 on first save, 200 after.
pub async fn adopt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
    body: Option<Json<AdoptRequest>>,
) -> Result<(StatusCode, Json<VaultItemDto>), AppError> {
    let Json(body) = body.unwrap_or_default();
    validate(&body)?;
    let memory_id = parse_id(&memory_id, "memory")?;

    let item = state
        .memory_service()
        .adopt(auth.user_id, memory_id, body.note)
        .await?;

    let status = if item.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(item)))
}

pub async fn unadopt(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let memory_id = parse_id(&memory_id, "memory")?;
    state.memory_service().unadopt(auth.user_id, memory_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vault(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<VaultItemDto>>, AppError> {
    let page = page.page()?;
    let items = state.memory_service().vault(auth.user_id, page).await?;
    Ok(Json(ListResponse::new(items, page.limit, |i| i.id.as_str())))
}

pub async fn reshare(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(memory_id): Path<String>,
    body: Option<Json<ReshareRequest>>,
) -> Result<(StatusCode, Json<MemoryDto>), AppError> {
    let Json(body) = body.unwrap_or_default();
    validate(&body)?;
    let memory_id = parse_id(&memory_id, "memory")?;

    let defaults = ReshareInput::default();
    let input = ReshareInput {
        body: body.body,
        scope: body.scope.unwrap_or(defaults.scope),
    };

    let memory = state
        .memory_service()
        .reshare(auth.user_id, memory_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(memory)))
}
