//! Media Service
//!
//! Image uploads: content type, signature and size checks, SafeSearch
//! moderation, then storage under a Snowflake file name.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::services::ContentModerator;
use crate::domain::{image_extension, sniff_image_extension, MediaStore, StoredMedia};
use crate::infrastructure::metrics::record_verification;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait MediaService: Send + Sync {
    async fn upload_image(
        &self,
        user_id: i64,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<MediaDto, MediaError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaDto {
    pub id: String,
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

impl From<StoredMedia> for MediaDto {
    fn from(media: StoredMedia) -> Self {
        Self {
            id: media.id.to_string(),
            url: media.url,
            content_type: media.content_type,
            size: media.size,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("The file is empty")]
    Empty,

    #[error("Only JPEG, PNG, GIF and WebP images are accepted")]
    UnsupportedType,

    #[error("The file content is not a {0} image")]
    ContentMismatch(&'static str),

    #[error("The file exceeds the {0} byte limit")]
    TooLarge(usize),

    #[error("The image was rejected by content moderation ({0})")]
    Blocked(&'static str),

    #[error("Content moderation is unavailable")]
    ModerationUnavailable,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Empty
            | MediaError::UnsupportedType
            | MediaError::ContentMismatch(_)
            | MediaError::TooLarge(_) => {
                AppError::field("file", err.to_string())
            }
            MediaError::Blocked(_) => AppError::Unprocessable(err.to_string()),
            MediaError::ModerationUnavailable => AppError::ServiceUnavailable(err.to_string()),
            MediaError::Store(e) => e,
        }
    }
}

pub struct MediaServiceImpl<S, V>
where
    S: MediaStore,
    V: ContentModerator,
{
    store: Arc<S>,
    moderator: Arc<V>,
    id_generator: Arc<SnowflakeGenerator>,
    max_bytes: usize,
}

impl<S, V> MediaServiceImpl<S, V>
where
    S: MediaStore,
    V: ContentModerator,
{
    pub fn new(
        store: Arc<S>,
        moderator: Arc<V>,
        id_generator: Arc<SnowflakeGenerator>,
        max_bytes: usize,
    ) -> Self {
        Self {
            store,
            moderator,
            id_generator,
            max_bytes,
        }
    }

    async fn moderate(&self, bytes: &[u8]) -> Result<(), MediaError> {
        match self.moderator.annotate(bytes.to_vec()).await {
            Ok(result) => match result.blocking_category(self.moderator.threshold()) {
                Some(category) => {
                    record_verification("moderation", "blocked");
                    Err(MediaError::Blocked(category))
                }
                None => Ok(()),
            },
            Err(e) if self.moderator.fail_open() => {
                warn!(error = %e, "Moderation unavailable, accepting upload");
                record_verification("moderation", "fail_open");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Moderation unavailable, rejecting upload");
                Err(MediaError::ModerationUnavailable)
            }
        }
    }
}

#[async_trait]
impl<S, V> MediaService for MediaServiceImpl<S, V>
where
    S: MediaStore + 'static,
    V: ContentModerator + 'static,
{
    async fn upload_image(
        &self,
        user_id: i64,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<MediaDto, MediaError> {
        let content_type = content_type.unwrap_or_default();
        let extension = image_extension(&content_type).ok_or(MediaError::UnsupportedType)?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge(self.max_bytes));
        }
        // The declared type must match the file signature
        if sniff_image_extension(&bytes) != Some(extension) {
            return Err(MediaError::ContentMismatch(extension));
        }

        self.moderate(&bytes).await?;

        let id = self.id_generator.generate();
        let file_name = format!("{id}.{extension}");
        let size = bytes.len();
        let url = self.store.put(&file_name, bytes).await?;

        info!(user_id, media_id = id, size, "Image uploaded");
        Ok(StoredMedia {
            id,
            file_name,
            content_type,
            size,
            url,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::{
        Likelihood, MockContentModerator, SafeSearch, VerificationError,
    };
    use crate::domain::MockMediaStore;

    const LIMIT: usize = 1024;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR";
    const WEBP: &[u8] = b"RIFF\x1a\x00\x00\x00WEBPVP8 ";

    fn moderator(result: Result<SafeSearch, VerificationError>, fail_open: bool) -> MockContentModerator {
        let mut moderator = MockContentModerator::new();
        moderator.expect_annotate().returning(move |_| result.clone());
        moderator.expect_threshold().return_const(Likelihood::Likely);
        moderator.expect_fail_open().return_const(fail_open);
        moderator
    }

    fn storing() -> MockMediaStore {
        let mut store = MockMediaStore::new();
        store
            .expect_put()
            .returning(|name, _| Ok(format!("https://cdn.example.com/{name}")));
        store
    }

    fn service(
        store: MockMediaStore,
        moderator: MockContentModerator,
    ) -> MediaServiceImpl<MockMediaStore, MockContentModerator> {
        MediaServiceImpl::new(
            Arc::new(store),
            Arc::new(moderator),
            Arc::new(SnowflakeGenerator::new(1, 1)),
            LIMIT,
        )
    }

    #[tokio::test]
    async fn test_rejects_non_images() {
        let svc = service(MockMediaStore::new(), MockContentModerator::new());
        let err = svc
            .upload_image(1, Some("application/pdf".into()), vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedType));
    }

    #[tokio::test]
    async fn test_rejects_oversized() {
        let svc = service(MockMediaStore::new(), MockContentModerator::new());
        let err = svc
            .upload_image(1, Some("image/png".into()), vec![0; LIMIT + 1])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::TooLarge(LIMIT)));
    }

    #[tokio::test]
    async fn test_blocked_image_not_stored() {
        let mut store = MockMediaStore::new();
        store.expect_put().never();
        let flagged = SafeSearch {
            adult: Likelihood::VeryLikely,
            ..SafeSearch::default()
        };

        let err = service(store, moderator(Ok(flagged), true))
            .upload_image(1, Some("image/jpeg".into()), JPEG.to_vec())
            .await
            .unwrap_err();
        assert_eq!(AppError::from(err).status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_outage_fails_open_when_configured() {
        let down = Err(VerificationError::Unavailable("timeout".into()));
        let dto = service(storing(), moderator(down, true))
            .upload_image(1, Some("image/webp".into()), WEBP.to_vec())
            .await
            .unwrap();
        assert!(dto.url.ends_with(".webp"));
        assert_eq!(dto.size, WEBP.len());
    }

    #[tokio::test]
    async fn test_outage_fails_closed_when_configured() {
        let down = Err(VerificationError::Unavailable("timeout".into()));
        let err = service(MockMediaStore::new(), moderator(down, false))
            .upload_image(1, Some("image/png".into()), PNG.to_vec())
            .await
            .unwrap_err();
        assert_eq!(AppError::from(err).status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_declared_type_must_match_signature() {
        let mut store = MockMediaStore::new();
        store.expect_put().never();
        let mut moderator = MockContentModerator::new();
        moderator.expect_annotate().never();

        let svc = service(store, moderator);
        let err = svc
            .upload_image(1, Some("image/png".into()), b"<html><script>".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ContentMismatch("png")));

        let err = svc
            .upload_image(1, Some("image/png".into()), JPEG.to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ContentMismatch("png")));
    }
}
