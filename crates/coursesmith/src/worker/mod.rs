pub mod processor;
pub mod scheduler;

use std::sync::Arc;

use crate::config::WorkerConfig;
use crate::db::{Database, SqliteAssetStore};
use crate::error::Result;
use crate::extractor::SourceExtractor;
use crate::generator::GeneratorRegistry;

pub use processor::{AssetOutcome, AssetProcessor};
pub use scheduler::{PollOutcome, Scheduler, SchedulerSettings};

/// Wires the production store, extractor and generators from `config`.
pub fn scheduler_from_config(config: &WorkerConfig, db: Database) -> Result<Scheduler> {
    let store = Arc::new(SqliteAssetStore::new(db));
    let extractor = Arc::new(SourceExtractor::from_config(config)?);
    let registry = GeneratorRegistry::from_config(config)?;

    let processor = AssetProcessor::new(store.clone(), extractor, registry)
        .with_generation_timeout(config.generation_timeout());

    Ok(Scheduler::new(
        store,
        Arc::new(processor),
        SchedulerSettings::from(config),
    ))
}
