//! Local filesystem media storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::StorageSettings;
use crate::domain::MediaStore;
use crate::shared::error::AppError;

/// Writes uploads into the configured directory, which is served statically
/// under `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(settings: &StorageSettings) -> Self {
        Self {
            root: PathBuf::from(&settings.upload_dir),
            public_base_url: settings.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// File names are generated server-side, but refuse anything that could
/// escape the upload directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn put(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AppError> {
        if !is_plain_file_name(file_name) {
            return Err(AppError::BadRequest("Invalid file name".into()));
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create upload dir: {e}")))?;

        let path = self.root.join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write upload: {e}")))?;

        debug!(path = %path.display(), "Stored upload");
        Ok(format!("{}/{}", self.public_base_url, file_name))
    }
}
