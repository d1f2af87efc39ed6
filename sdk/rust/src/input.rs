use std::path::Path;

use themis_core::data_url::DataUrl;
use tracing::debug;

use crate::error::{ClientError, Result};

/// A case file as loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseInput {
    Text(String),
    /// Needs OCR through `extractText`.
    Image(DataUrl),
}

/// MIME type for an image file extension we accept.
pub fn image_mime(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

impl CaseInput {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_bytes(&name, bytes)
    }

    /// Classify by extension: images become data URLs, everything else must
    /// be UTF-8 text.
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if let Some(mime) = image_mime(extension) {
            debug!(file_name, mime, size = bytes.len(), "loaded image input");
            return Ok(Self::Image(DataUrl::encode(mime, &bytes)));
        }
        match String::from_utf8(bytes) {
            Ok(text) => {
                debug!(file_name, len = text.len(), "loaded text input");
                Ok(Self::Text(text))
            },
            Err(_) => Err(ClientError::UnsupportedFile(format!(
                "{file_name} is neither an image nor UTF-8 text"
            ))),
        }
    }
}
