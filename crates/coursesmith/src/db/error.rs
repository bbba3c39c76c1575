//! Errors raised by the asset store.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot prepare database directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A thread panicked while holding the connection.
    #[error("Asset store connection lock poisoned")]
    LockPoisoned,

    /// The store could not be reached (blocking task lost, remote down).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
