//! Filesystem-based asset store
//!
//! Each asset is a plain file under the base directory; the key is its
//! relative path. Writes go to a temporary file first and are renamed into
//! place so readers never see a partial asset.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::config::StorageConfig;
use crate::error::StorageError;

use super::{validate_key, AssetStore};

/// Filesystem asset store
pub struct FilesystemAssetStore {
    base_path: PathBuf,
    public_url: String,
}

impl FilesystemAssetStore {
    /// Creates a store rooted at `base_path` whose assets are served under `public_url`
    pub fn new(base_path: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates the store from configuration and makes sure the base directory exists
    pub async fn new_with_init(config: &StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.base_path).await?;
        Ok(Self::new(&config.base_path, config.public_url.clone()))
    }

    /// Returns the base path for asset storage
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Public URL for an asset key
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

#[async_trait]
impl AssetStore for FilesystemAssetStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<String, StorageError> {
        validate_key(key)?;

        let path = self.key_to_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &data).await?;
        fs::rename(&tmp_path, &path).await?;

        tracing::debug!(key = %key, size = data.len(), "Stored asset");

        Ok(self.url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;

        match fs::remove_file(self.key_to_path(key)).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Deleted asset");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
