//! Media upload entity and storage contract.

use async_trait::async_trait;

use crate::shared::error::AppError;

/// Image types accepted for upload, with the extension stored on disk.
pub const ALLOWED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Extension for an accepted image content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// Extension for the image format the leading bytes actually encode.
pub fn sniff_image_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("png"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        _ => None,
    }
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub url: String,
}

/// Where uploaded bytes end up.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists `bytes` under `file_name` and returns the public URL.
    async fn put(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(image_extension("application/pdf"), None);
    }

    #[test]
    fn test_sniff_image_extension() {
        assert_eq!(sniff_image_extension(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some("jpg"));
        assert_eq!(
            sniff_image_extension(b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR"),
            Some("png")
        );
        assert_eq!(sniff_image_extension(b"GIF87a\x01\x00"), Some("gif"));
        assert_eq!(sniff_image_extension(b"GIF89a\x01\x00"), Some("gif"));
        assert_eq!(sniff_image_extension(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_image_extension(b"RIFF\x24\x00\x00\x00WAVEfmt "), None);
        assert_eq!(sniff_image_extension(b"<svg xmlns="), None);
        assert_eq!(sniff_image_extension(&[0xFF, 0xD8]), None);
    }
}
