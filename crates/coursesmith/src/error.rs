use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum CoursesmithError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Systemic error: {0}")]
    Systemic(#[from] SystemicError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Failure to turn a document reference into text.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document '{url}' is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Failed to read document '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document '{url}' could not be parsed: {reason}")]
    Unparseable { url: String, reason: String },

    #[error("Document '{url}' contains no text")]
    Empty { url: String },

    #[error("Unsupported document reference scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid document reference '{url}': {reason}")]
    InvalidReference { url: String, reason: String },
}

/// Failure inside the dispatch table or a format generator.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Unsupported asset type: {0}")]
    UnsupportedType(String),

    #[error("Completion service failed: {0}")]
    Completion(String),

    #[error("Completion service returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Failed to render artifact: {0}")]
    Render(String),

    #[error("Failed to store artifact: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl GenerationError {
    /// Data defects that no retry can fix.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationError::UnsupportedType(_))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact key '{0}'")]
    InvalidKey(String),
}

/// Per-asset attempt failure. Always converted into a `failed` status write.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Processing aborted: {0}")]
    Aborted(String),
}

/// Faults that affect the whole poll cycle rather than a single asset.
#[derive(Error, Debug)]
pub enum SystemicError {
    #[error("Asset store unavailable: {0}")]
    Store(#[from] DatabaseError),

    #[error("Failed to record terminal status for {count} asset(s)")]
    StatusWrites { count: usize },
}

pub type Result<T> = std::result::Result<T, CoursesmithError>;
