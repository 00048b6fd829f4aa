//! Publishing generated images to the blob store.
//!
//! Image bytes are written to a `NamedTempFile` before the upload so the
//! blob-store client works from a real file. The temp file is owned by the
//! `publish` call and removed when it goes out of scope, whichever way the
//! call ends.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};

pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";
const NAME_PREFIX_MAX: usize = 40;

/// Normalized result of a single upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub url: String,
    pub key: String,
    pub size: u64,
    pub name: String,
}

/// The object store the relay publishes into.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, file: &Path, name: &str, content_type: &str) -> AppResult<UploadResult>;
}

#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn BlobStore>,
    staging_dir: PathBuf,
}

impl Publisher {
    pub fn new(store: Arc<dyn BlobStore>, staging_dir: PathBuf) -> Self {
        Publisher { store, staging_dir }
    }

    /// Stage `bytes` and upload them. The prompt only shapes the file name.
    pub async fn publish(&self, bytes: Vec<u8>, prompt: &str) -> AppResult<UploadResult> {
        let staged = self.stage(bytes).await?;
        let name = display_name(prompt);
        info!("Uploading {} to blob store", name);

        let result = self
            .store
            .upload(staged.path(), &name, IMAGE_CONTENT_TYPE)
            .await
            .map_err(|e| match e {
                AppError::PublishFailed(_) => e,
                other => AppError::PublishFailed(other.to_string()),
            });

        let path = staged.path().to_path_buf();
        if let Err(e) = staged.close() {
            error!("Failed to remove staged file {}: {}", path.display(), e);
        } else {
            debug!("Temporary file {} deleted", path.display());
        }

        result
    }

    async fn stage(&self, bytes: Vec<u8>) -> AppResult<NamedTempFile> {
        let dir = self.staging_dir.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            use std::io::Write;
            let mut file = tempfile::Builder::new()
                .prefix("relay-")
                .suffix(".jpg")
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| AppError::PublishFailed(format!("staging task failed: {}", e)))?
        .map_err(|e| {
            error!("Failed to stage image: {}", e);
            AppError::PublishFailed(format!("could not stage image: {}", e))
        })
    }
}

/// File name shown in the blob store: a slug of the prompt plus a short
/// random suffix so identical prompts never collide.
pub fn display_name(prompt: &str) -> String {
    let mut slug = String::new();
    for c in prompt.chars() {
        if slug.len() >= NAME_PREFIX_MAX {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    if slug.is_empty() {
        format!("image-{}.jpg", suffix)
    } else {
        format!("{}-{}.jpg", slug, suffix)
    }
}
