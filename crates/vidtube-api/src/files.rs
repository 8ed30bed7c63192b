use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::media::{MediaKind, UploadedMedia};

/// A multipart file spooled to the upload directory. The file is removed
/// when this value is dropped, whether or not the upload succeeded.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    size: u64,
}

impl TempUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove temp upload {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Text fields and spooled files of one multipart request.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, TempUpload>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<TempUpload> {
        self.files.remove(name)
    }

    /// Read every part: text parts into memory, file parts streamed to
    /// `upload_dir`. Empty file parts are ignored.
    pub async fn read(mut multipart: Multipart, upload_dir: &Path) -> Result<Self, ApiError> {
        let mut form = Self::default();

        tokio::fs::create_dir_all(upload_dir).await.map_err(|e| {
            error!("Failed to create upload directory {}: {}", upload_dir.display(), e);
            anyhow::Error::from(e)
        })?;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Malformed field {name}: {e}")))?;
                form.fields.insert(name, value);
                continue;
            };

            let extension = Path::new(&file_name)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e.to_ascii_lowercase()))
                .unwrap_or_default();
            let mut upload = TempUpload {
                path: upload_dir.join(format!("{}{}", Uuid::new_v4(), extension)),
                size: 0,
            };

            let mut file = tokio::fs::File::create(&upload.path).await.map_err(|e| {
                error!("Failed to create temp file {}: {}", upload.path.display(), e);
                anyhow::Error::from(e)
            })?;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| ApiError::validation(format!("Malformed file {name}: {e}")))?
            {
                file.write_all(&chunk).await.map_err(anyhow::Error::from)?;
                upload.size += chunk.len() as u64;
            }
            file.flush().await.map_err(anyhow::Error::from)?;

            if upload.size > 0 {
                form.files.insert(name, upload);
            }
        }

        Ok(form)
    }
}

/// Push a spooled file to the media host. Any host failure rejects the
/// whole operation; the temp file is removed either way.
pub async fn publish(
    state: &AppState,
    upload: TempUpload,
    kind: MediaKind,
) -> Result<UploadedMedia, ApiError> {
    debug!("Publishing {} ({} bytes) as {:?}", upload.path().display(), upload.size(), kind);
    let result = state.media.upload(upload.path(), kind).await;
    drop(upload);
    result.map_err(|e| ApiError::Internal(e.context("Media upload failed")))
}
