//! The store contract the worker depends on.

use async_trait::async_trait;
use chrono::Utc;

use super::{asset_repo, Database, DatabaseError};
use crate::asset::{Asset, StatusUpdate};

/// Persisted source of truth for asset status.
///
/// The worker keeps no state of its own; everything it needs survives a
/// restart through this trait.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// All assets currently in `processing`.
    async fn fetch_pending(&self) -> Result<Vec<Asset>, DatabaseError>;

    /// Atomically records a terminal transition. Returns `false` when the
    /// asset was no longer in `processing`.
    async fn update_status(&self, id: &str, update: StatusUpdate) -> Result<bool, DatabaseError>;
}

/// `AssetStore` over the SQLite `Database`. Queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteAssetStore {
    db: Database,
}

impl SqliteAssetStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl AssetStore for SqliteAssetStore {
    async fn fetch_pending(&self) -> Result<Vec<Asset>, DatabaseError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || asset_repo::fetch_pending(&db))
            .await
            .map_err(|e| DatabaseError::Unavailable(e.to_string()))?
    }

    async fn update_status(&self, id: &str, update: StatusUpdate) -> Result<bool, DatabaseError> {
        let db = self.db.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            asset_repo::update_status(&db, &id, &update, Utc::now())
        })
        .await
        .map_err(|e| DatabaseError::Unavailable(e.to_string()))?
    }
}
