pub mod filesystem;

use async_trait::async_trait;

use crate::error::StorageError;

pub use filesystem::FileArtifactStore;

/// Bucket every generated artifact is written under.
pub const ARTIFACT_BUCKET: &str = "processed-assets";

/// External object store: write bytes, get back a retrievable locator.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `content` under `key`, replacing any previous object with the
    /// same key, and returns its public locator.
    async fn put(&self, key: &str, content: Vec<u8>) -> Result<String, StorageError>;

    /// Locator `put` would return for `key`, without writing anything.
    fn locator(&self, key: &str) -> String;
}
