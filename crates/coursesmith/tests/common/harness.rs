//! Isolated environment for driving assets through the worker.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::params;
use tempfile::TempDir;

use coursesmith::db::asset_repo;
use coursesmith::generator::{GeneratorDeps, OfflineCompletionClient};
use coursesmith::{
    Asset, AssetProcessor, AssetStore, AssetType, Database, FileArtifactStore, Generator,
    GeneratorRegistry, NewAsset, Scheduler, SchedulerSettings, SourceExtractor,
    SqliteAssetStore,
};

pub const PUBLIC_BASE_URL: &str = "https://cdn.test/storage";

pub struct TestHarness {
    temp_dir: TempDir,
    /// Root for `doc://` references.
    pub documents_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let documents_dir = temp_dir.path().join("documents");
        let artifacts_dir = temp_dir.path().join("artifacts");
        std::fs::create_dir_all(&documents_dir).expect("Failed to create documents dir");

        Self {
            temp_dir,
            documents_dir,
            artifacts_dir,
            db: Database::open_in_memory().expect("Failed to open database"),
        }
    }

    pub fn write_document(&self, name: &str, content: &str) {
        let path = self.documents_dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create document dir");
        }
        std::fs::write(path, content).expect("Failed to write document");
    }

    pub fn enqueue(&self, new: NewAsset) -> Asset {
        asset_repo::insert(&self.db, &new).expect("Failed to insert asset")
    }

    pub fn asset(&self, id: &str) -> Asset {
        asset_repo::find_by_id(&self.db, id)
            .expect("Failed to read asset")
            .unwrap_or_else(|| panic!("asset {} not found", id))
    }

    /// Puts a terminal row back into `processing`, as a requeue would.
    pub fn requeue(&self, id: &str) {
        self.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE assets SET status = 'processing', output_url = NULL,
                     completed_at = NULL, failure_reason = NULL WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .expect("Failed to requeue asset");
    }

    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.artifacts_dir.join("processed-assets").join(key)
    }

    pub fn store(&self) -> Arc<SqliteAssetStore> {
        Arc::new(SqliteAssetStore::new(self.db.clone()))
    }

    pub fn extractor(&self) -> Arc<SourceExtractor> {
        Arc::new(SourceExtractor::new(
            &self.documents_dir,
            reqwest::Client::new(),
        ))
    }

    /// The four built-in generators over the offline client, writing into
    /// the harness artifact directory.
    pub fn standard_registry(&self) -> GeneratorRegistry {
        let deps = GeneratorDeps::new(
            Arc::new(OfflineCompletionClient::new()),
            Arc::new(FileArtifactStore::new(&self.artifacts_dir, PUBLIC_BASE_URL)),
        );
        GeneratorRegistry::standard(deps)
    }

    /// Standard registry with one format swapped for `generator`.
    pub fn registry_with(&self, generator: Arc<dyn Generator>) -> GeneratorRegistry {
        let standard = self.standard_registry();
        let mut builder = GeneratorRegistry::builder();
        for asset_type in AssetType::ALL {
            builder = builder.register(
                standard
                    .resolve(asset_type.as_str())
                    .expect("standard registry covers every type"),
            );
        }
        builder
            .register(generator)
            .build()
            .expect("registry covers every type")
    }

    pub fn processor(&self) -> AssetProcessor {
        self.processor_with(self.store(), self.standard_registry())
    }

    pub fn processor_with(
        &self,
        store: Arc<dyn AssetStore>,
        registry: GeneratorRegistry,
    ) -> AssetProcessor {
        AssetProcessor::new(store, self.extractor(), registry)
    }

    pub fn scheduler(&self, processor: AssetProcessor) -> Scheduler {
        Scheduler::new(
            self.store(),
            Arc::new(processor),
            SchedulerSettings::default(),
        )
    }
}
