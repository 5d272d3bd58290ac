//! Upload client: sending a file and recording its placeholder.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use url::Url;

use crate::client::ChatBackend;
use crate::error::{Error, Result};
use crate::message_log::{ArtifactKind, UploadArtifact};
use crate::observability::{UPLOADS, UPLOAD_BYTES};

/// Media type used when the extension says nothing.
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Name sent to the server and shown in the log.
    pub file_name: String,
    /// MIME type, e.g. `image/png`.
    pub media_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Where the file was read from, if it came from disk.
    pub path: Option<PathBuf>,
}

impl UploadFile {
    /// Creates an in-memory file.
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
            path: None,
        }
    }

    /// Reads a file from disk, guessing its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::validation(
                    format!("{} does not name a file", path.display()),
                    Some("path".to_string()),
                )
            })?;
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(FALLBACK_MEDIA_TYPE)
            .to_string();
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(Self {
            file_name,
            media_type,
            bytes,
            path: Some(path),
        })
    }

    /// True when the media type is an image type.
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// A reference that displays the file locally, without the server.
    ///
    /// A `file://` URL when the file came from disk, otherwise a `data:` URL.
    pub fn local_preview(&self) -> String {
        if let Some(url) = self
            .path
            .as_deref()
            .and_then(|path| Url::from_file_path(path).ok())
        {
            return url.to_string();
        }
        format!(
            "data:{};base64,{}",
            self.media_type,
            STANDARD.encode(&self.bytes)
        )
    }

    /// Builds the log placeholder for this file.
    pub fn artifact(&self) -> UploadArtifact {
        if self.is_image() {
            UploadArtifact {
                file_name: self.file_name.clone(),
                kind: ArtifactKind::Image,
                preview_url: Some(self.local_preview()),
            }
        } else {
            UploadArtifact {
                file_name: self.file_name.clone(),
                kind: ArtifactKind::File,
                preview_url: None,
            }
        }
    }
}

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    /// The server's JSON answer, uninterpreted.
    pub response: Value,
    /// The placeholder to append to the log.
    pub artifact: UploadArtifact,
}

/// The error shown when an upload is attempted with nothing selected.
pub fn no_selection() -> Error {
    Error::validation("Select a file", None)
}

/// Uploads the selected file.
///
/// With nothing selected this fails with a validation error before any
/// request is made.
pub async fn upload<B: ChatBackend + ?Sized>(
    backend: &B,
    token: &str,
    selection: Option<&UploadFile>,
) -> Result<UploadReceipt> {
    let Some(file) = selection else {
        return Err(no_selection());
    };
    tracing::debug!(file = %file.file_name, media_type = %file.media_type, "uploading");
    let response = backend.upload(token, file).await?;
    UPLOADS.click();
    UPLOAD_BYTES.count(file.bytes.len() as u64);
    Ok(UploadReceipt {
        response,
        artifact: file.artifact(),
    })
}
