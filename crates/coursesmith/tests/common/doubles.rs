//! Test doubles for the store, extractor and generator seams.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use coursesmith::{
    Asset, AssetStatus, AssetStore, AssetType, DatabaseError, DocumentExtractor,
    ExtractionError, GenerationError, Generator, StatusUpdate,
};

pub fn pending_asset(id: &str, asset_type: &str) -> Asset {
    let now = Utc::now();
    Asset {
        id: id.to_string(),
        asset_type: asset_type.to_string(),
        status: AssetStatus::Processing,
        original_document_url: format!("doc://{}.txt", id),
        original_document_name: format!("{} source", id),
        audience: None,
        tone: None,
        compliance_text: None,
        output_url: None,
        completed_at: None,
        failure_reason: None,
        created_at: Some(now),
        updated_at: Some(now),
    }
}

/// In-memory store that records when it was polled and can be told to
/// fail.
#[derive(Default)]
pub struct MemoryAssetStore {
    assets: Mutex<Vec<Asset>>,
    fetch_failures: AtomicUsize,
    fail_writes: AtomicBool,
    polls: Mutex<Vec<Instant>>,
}

impl MemoryAssetStore {
    pub fn with_assets(assets: Vec<Asset>) -> Self {
        Self {
            assets: Mutex::new(assets),
            ..Self::default()
        }
    }

    /// The next `count` fetches fail.
    pub fn fail_fetches(&self, count: usize) {
        self.fetch_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn polls(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<Asset> {
        self.assets
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn fetch_pending(&self) -> Result<Vec<Asset>, DatabaseError> {
        self.polls.lock().unwrap().push(Instant::now());

        let remaining = self.fetch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fetch_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DatabaseError::Unavailable("connection reset".to_string()));
        }

        Ok(self
            .assets
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.status == AssetStatus::Processing)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: &str, update: StatusUpdate) -> Result<bool, DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("read-only replica".to_string()));
        }

        let mut assets = self.assets.lock().unwrap();
        let Some(asset) = assets
            .iter_mut()
            .find(|a| a.id == id && a.status == AssetStatus::Processing)
        else {
            return Ok(false);
        };

        asset.status = update.status();
        match update {
            StatusUpdate::Completed { output_url } => {
                asset.output_url = Some(output_url);
                asset.completed_at = Some(Utc::now());
            }
            StatusUpdate::Failed { reason } => asset.failure_reason = Some(reason),
        }
        Ok(true)
    }
}

/// Returns the same text for every reference.
pub struct StubExtractor(pub &'static str);

#[async_trait]
impl DocumentExtractor for StubExtractor {
    async fn extract(&self, _document_url: &str) -> Result<String, ExtractionError> {
        Ok(self.0.to_string())
    }
}

/// Returns `stub://<type>/<id>` without rendering anything.
pub struct StubGenerator(pub AssetType);

#[async_trait]
impl Generator for StubGenerator {
    fn asset_type(&self) -> AssetType {
        self.0
    }

    async fn generate(&self, asset: &Asset, _text: &str) -> Result<String, GenerationError> {
        Ok(format!("stub://{}/{}", self.0, asset.id))
    }
}

pub struct PanickingGenerator(pub AssetType);

#[async_trait]
impl Generator for PanickingGenerator {
    fn asset_type(&self) -> AssetType {
        self.0
    }

    async fn generate(&self, asset: &Asset, _text: &str) -> Result<String, GenerationError> {
        panic!("renderer crashed on {}", asset.id);
    }
}

/// Sleeps before answering; counts calls.
pub struct StallingGenerator {
    pub asset_type: AssetType,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl StallingGenerator {
    pub fn new(asset_type: AssetType, delay: Duration) -> Self {
        Self {
            asset_type,
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Generator for StallingGenerator {
    fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    async fn generate(&self, asset: &Asset, _text: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(format!("stub://{}/{}", self.asset_type, asset.id))
    }
}
