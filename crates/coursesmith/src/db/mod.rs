//! SQLite persistence for the `assets` table.
//!
//! `Database` is the shared connection handle, `asset_repo` holds the
//! queries, and `store` exposes them to the worker as an [`AssetStore`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod asset_repo;
pub mod error;
pub mod migrations;
pub mod store;

pub use error::DatabaseError;
pub use store::{AssetStore, SqliteAssetStore};

/// How long a statement waits on a lock held by another process (the
/// creation flow or a status reader) before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle over one rusqlite connection. Clones share the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database file, creating it and its directory if needed,
    /// and migrates the schema.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| DatabaseError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        // WAL lets status readers run alongside worker writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::prepare(conn)?;

        log::info!("Asset database ready at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    pub fn schema_version(&self) -> Result<u32, DatabaseError> {
        self.with_conn(migrations::current_version)
    }
}

/// `~/.coursesmith/data/coursesmith.db`
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".coursesmith").join("data").join("coursesmith.db"))
}
