use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{ArtifactStore, ARTIFACT_BUCKET};
use crate::error::StorageError;

/// Artifact store on a local (or mounted) directory served under
/// `public_base_url`.
pub struct FileArtifactStore {
    root: PathBuf,
    public_base_url: String,
}

impl FileArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P, public_base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn bucket_directory(&self) -> PathBuf {
        self.root.join(ARTIFACT_BUCKET)
    }

    /// Filesystem path of the object stored under `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.bucket_directory().join(key))
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<String, StorageError> {
        let final_path = self.path_for(key)?;
        let dir = self.bucket_directory();
        self.ensure_directory(&dir).await?;

        // Write-then-rename so a reader never sees a half-written artifact and
        // a retried attempt replaces the previous object in one step.
        let temp_path = dir.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: temp_path.clone(),
                source: e,
            })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::WriteFile {
                path: final_path,
                source: e,
            });
        }

        log::debug!("Stored artifact {} ({} bytes)", key, content.len());
        Ok(self.locator(key))
    }

    fn locator(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, ARTIFACT_BUCKET, key)
    }
}

/// Keys are flat file names: no separators, no traversal, no hidden files.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
