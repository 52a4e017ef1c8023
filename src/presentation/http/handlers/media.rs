//! Media Upload Handler

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};

use crate::application::services::{MediaDto, MediaService};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

const FILE_FIELD: &str = "file";

/// Upload one image as the multipart field `file`
pub async fn upload_image(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaDto>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let media = state
            .media_service()
            .upload_image(auth.user_id, content_type, bytes.to_vec())
            .await?;
        return Ok((StatusCode::CREATED, Json(media)));
    }

    Err(AppError::field(FILE_FIELD, "An image file is required"))
}
