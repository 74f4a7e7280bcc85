//! Local disk storage for uploaded images.
//!
//! Files are stored under the SHA-256 of their content, so uploading the same
//! image twice yields the same URL and a single file.

use std::path::{Path, PathBuf};

use cardhub_utils::{validate_file_size, validate_file_type, CardHubResult, StorageConfig};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoredFile {
    pub url: String,
    pub file_name: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_path: String,
    max_size: u64,
    allowed_extensions: Vec<String>,
}

impl LocalStorage {
    pub fn new(
        root: impl Into<PathBuf>,
        public_path: &str,
        max_size: u64,
        allowed_extensions: Vec<String>,
    ) -> Self {
        Self {
            root: root.into(),
            public_path: public_path.trim_end_matches('/').to_string(),
            max_size,
            allowed_extensions,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.upload_dir,
            &config.public_path,
            config.max_upload_size,
            config.allowed_extensions.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> CardHubResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Validate and store `bytes`, named after their digest.
    pub async fn store(&self, original_name: &str, bytes: &[u8]) -> CardHubResult<StoredFile> {
        let extension = validate_file_type(original_name, &self.allowed_extensions)?;
        let size = bytes.len() as u64;
        validate_file_size(size, self.max_size)?;

        let file_name = format!("{}.{}", hex::encode(Sha256::digest(bytes)), extension);
        let path = self.root.join(&file_name);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(file_name = %file_name, "Upload already stored");
        } else {
            self.ensure_root().await?;
            // Write then rename so a partial file is never served
            let staging = self.root.join(format!(".{}.part", Uuid::new_v4()));
            tokio::fs::write(&staging, bytes).await?;
            tokio::fs::rename(&staging, &path).await?;
            tracing::info!(file_name = %file_name, size, "Upload stored");
        }

        Ok(StoredFile {
            url: format!("{}/{}", self.public_path, file_name),
            file_name,
            size,
        })
    }
}
