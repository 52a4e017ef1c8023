//! Direct Message Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::SendMessageRequest;
use crate::application::dto::response::{CountResponse, ListResponse};
use crate::application::services::{
    ConversationDto, CreateMessageDto, MessageDto, MessageService,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Conversations, most recent first
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<ConversationDto>>, AppError> {
    let conversations = state
        .message_service()
        .list_conversations(auth.user_id, page.limit())
        .await?;
    Ok(Json(ListResponse::all(conversations)))
}

/// Messages exchanged with one peer, newest first
pub async fn get_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<MessageDto>>, AppError> {
    let peer_id = parse_id(&user_id, "user")?;
    let page = page.page()?;
    let messages = state
        .message_service()
        .get_conversation(auth.user_id, peer_id, page)
        .await?;
    Ok(Json(ListResponse::new(messages, page.limit, |m| m.id.as_str())))
}

/// Send a plaintext or end-to-end encrypted message to a friend
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageDto>), AppError> {
    validate(&body)?;
    let recipient_id = parse_id(&user_id, "user")?;

    let message = state
        .message_service()
        .send_message(
            auth.user_id,
            recipient_id,
            CreateMessageDto {
                content: body.content,
                envelope: body.envelope,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Mark everything the peer sent as read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<CountResponse>, AppError> {
    let peer_id = parse_id(&user_id, "user")?;
    let count = state
        .message_service()
        .mark_read(auth.user_id, peer_id)
        .await?;
    Ok(Json(CountResponse {
        count: count as i64,
    }))
}

/// Sender deletes a message for both sides
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let message_id = parse_id(&message_id, "message")?;
    state
        .message_service()
        .delete_message(auth.user_id, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
