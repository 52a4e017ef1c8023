//! Inbox Handlers

use axum::{
    extract::{Query, State},
    Json,
};

use crate::application::dto::request::{InboxQuery, MarkReadRequest};
use crate::application::dto::response::{CountResponse, ListResponse};
use crate::application::services::{InboxService, NotificationDto};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_ids, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Notifications, newest first. `?unread=true` hides read ones.
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<InboxQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<NotificationDto>>, AppError> {
    let page = page.page()?;
    let items = state
        .inbox_service()
        .list(auth.user_id, filter.unread, page)
        .await?;
    Ok(Json(ListResponse::new(items, page.limit, |n| n.id.as_str())))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CountResponse>, AppError> {
    let count = state.inbox_service().unread_count(auth.user_id).await?;
    Ok(Json(CountResponse { count }))
}

/// Mark the listed notifications (or all of them) read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<MarkReadRequest>>,
) -> Result<Json<CountResponse>, AppError> {
    let Json(body) = body.unwrap_or_default();
    validate(&body)?;
    let ids = body
        .ids
        .as_deref()
        .map(|ids| parse_ids(ids, "notification"))
        .transpose()?;

    let count = state.inbox_service().mark_read(auth.user_id, ids).await?;
    Ok(Json(CountResponse {
        count: count as i64,
    }))
}
