//! Per-asset state machine: one attempt, one terminal status write.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::asset::{Asset, StatusUpdate};
use crate::db::{AssetStore, DatabaseError};
use crate::error::{GenerationError, ProcessError};
use crate::extractor::DocumentExtractor;
use crate::generator::GeneratorRegistry;
use crate::sanitize::redact_document_url;

/// Result of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetOutcome {
    pub asset_id: String,
    pub update: StatusUpdate,
    /// `false` when the row had already left `processing` and was not touched.
    pub recorded: bool,
}

impl AssetOutcome {
    pub fn is_completed(&self) -> bool {
        self.recorded && matches!(self.update, StatusUpdate::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        self.recorded && matches!(self.update, StatusUpdate::Failed { .. })
    }
}

pub struct AssetProcessor {
    store: Arc<dyn AssetStore>,
    extractor: Arc<dyn DocumentExtractor>,
    registry: GeneratorRegistry,
    generation_timeout: Option<Duration>,
}

impl AssetProcessor {
    pub fn new(
        store: Arc<dyn AssetStore>,
        extractor: Arc<dyn DocumentExtractor>,
        registry: GeneratorRegistry,
    ) -> Self {
        Self {
            store,
            extractor,
            registry,
            generation_timeout: None,
        }
    }

    /// Bounds each generator call; expiry fails the asset.
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = Some(timeout);
        self
    }

    /// Runs one attempt and writes its terminal status.
    ///
    /// Every per-asset error becomes a `failed` write. The only error
    /// returned is the store refusing that write.
    pub async fn process(&self, asset: &Asset) -> Result<AssetOutcome, DatabaseError> {
        let span = info_span!(
            "process_asset",
            asset_id = %asset.id,
            asset_type = %asset.asset_type,
            document = %redact_document_url(&asset.original_document_url),
        );

        async {
            let update = match self.attempt(asset).await {
                Ok(output_url) => {
                    info!(output_url = %output_url, "Asset completed");
                    StatusUpdate::Completed { output_url }
                }
                Err(e) => {
                    warn!(error = %e, "Asset failed");
                    StatusUpdate::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            self.record(&asset.id, update).await
        }
        .instrument(span)
        .await
    }

    /// Writes a terminal status for `asset_id`.
    pub async fn record(
        &self,
        asset_id: &str,
        update: StatusUpdate,
    ) -> Result<AssetOutcome, DatabaseError> {
        let recorded = self.store.update_status(asset_id, update.clone()).await?;
        if !recorded {
            warn!(
                asset_id = %asset_id,
                "Asset was no longer processing, status left unchanged"
            );
        }
        Ok(AssetOutcome {
            asset_id: asset_id.to_string(),
            update,
            recorded,
        })
    }

    async fn attempt(&self, asset: &Asset) -> Result<String, ProcessError> {
        // Unknown types fail before any extraction work.
        let generator = self.registry.resolve(&asset.asset_type)?;

        let text = self
            .extractor
            .extract(&asset.original_document_url)
            .instrument(info_span!("extract"))
            .await?;
        debug!(chars = text.len(), "Document extracted");

        let generate = generator
            .generate(asset, &text)
            .instrument(info_span!("generate"));
        let output_url = match self.generation_timeout {
            Some(limit) => tokio::time::timeout(limit, generate)
                .await
                .map_err(|_| GenerationError::Timeout {
                    secs: limit.as_secs(),
                })??,
            None => generate.await?,
        };

        if output_url.trim().is_empty() {
            return Err(
                GenerationError::Render("generator returned an empty locator".to_string()).into(),
            );
        }
        Ok(output_url)
    }
}
