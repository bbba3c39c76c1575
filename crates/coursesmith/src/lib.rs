pub mod asset;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod worker;

pub use asset::{Asset, AssetStatus, AssetType, NewAsset, StatusUpdate};
pub use config::{load_config, resolve_config, WorkerConfig};
pub use db::{AssetStore, Database, DatabaseError, SqliteAssetStore};
pub use error::{
    ConfigError, CoursesmithError, ExtractionError, GenerationError, ProcessError, Result,
    StorageError, SystemicError,
};
pub use extractor::{DocumentExtractor, SourceExtractor};
pub use generator::{Generator, GeneratorRegistry};
pub use secrets::{resolve_secret, SecretError};
pub use storage::{ArtifactStore, FileArtifactStore};
pub use worker::{AssetProcessor, PollOutcome, Scheduler, SchedulerSettings};
