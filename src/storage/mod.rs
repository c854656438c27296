//! Asset storage for vicdan
//!
//! Generated QR codes (and any other binary assets) are written through the
//! [`AssetStore`] trait. The filesystem implementation keeps them in a
//! directory that the HTTP server exposes under `/assets`.

pub mod filesystem;

pub use filesystem::FilesystemAssetStore;

use async_trait::async_trait;

use crate::error::StorageError;

/// Store for publicly reachable binary assets
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing asset
    ///
    /// Returns the public URL of the stored asset
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<String, StorageError>;

    /// Delete the asset under `key`; a missing asset is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Check that a key is a relative path of safe segments
///
/// Segments may contain ASCII letters, digits, `-`, `_` and `.`, but may
/// not be empty or consist only of dots.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && !segment.chars().all(|c| c == '.')
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        });

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
