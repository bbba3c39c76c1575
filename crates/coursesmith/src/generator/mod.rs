//! Format generators and the dispatch table that selects them.
//!
//! Every generator follows the same three steps: draft an outline through
//! the [`CompletionClient`], render it into the format's encoding, and
//! publish the bytes through the [`ArtifactStore`] under a key derived from
//! the asset id. Keys are deterministic, so rerunning a generator for the
//! same asset replaces its artifact.

pub mod client;
pub mod elearning;
pub mod job_aid;
pub mod markup;
pub mod outline;
pub mod process_map;
pub mod prompt;
pub mod registry;
pub mod video;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::asset::{Asset, AssetType};
use crate::error::GenerationError;
use crate::storage::ArtifactStore;

pub use client::{CompletionClient, CompletionRequest, HttpCompletionClient, OfflineCompletionClient};
pub use elearning::ELearningGenerator;
pub use job_aid::JobAidGenerator;
pub use outline::{Outline, Section};
pub use process_map::ProcessMapGenerator;
pub use registry::{GeneratorRegistry, RegistryBuilder};
pub use video::VideoGenerator;

/// Default completion budget per draft.
pub const DEFAULT_MAX_TOKENS: u32 = 600;

#[async_trait]
pub trait Generator: Send + Sync {
    fn asset_type(&self) -> AssetType;

    /// Produces and stores the artifact, returning its locator.
    async fn generate(&self, asset: &Asset, text: &str) -> Result<String, GenerationError>;
}

/// Capabilities shared by the built-in generators.
#[derive(Clone)]
pub struct GeneratorDeps {
    pub client: Arc<dyn CompletionClient>,
    pub store: Arc<dyn ArtifactStore>,
    pub max_tokens: u32,
}

impl GeneratorDeps {
    pub fn new(client: Arc<dyn CompletionClient>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            client,
            store,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Asks the completion service for an outline of `text`.
    ///
    /// A reply with no usable structure falls back to outlining the source
    /// text directly; an empty source yields a title-only outline.
    pub async fn draft(
        &self,
        asset_type: AssetType,
        asset: &Asset,
        text: &str,
    ) -> Result<Outline, GenerationError> {
        let request = prompt::build_request(asset_type, asset, text, self.max_tokens);
        let reply = self.client.complete(&request).await?;

        let outline = Outline::parse(&reply, asset.document_name());
        if !outline.is_empty() {
            return Ok(outline);
        }

        debug!(
            "Draft for asset {} had no structure, outlining the source text",
            asset.id
        );
        let mut fallback = Outline::parse(text, asset.document_name());
        if fallback.title == asset.document_name() && outline.title != fallback.title {
            fallback.title = outline.title;
        }
        Ok(fallback)
    }

    pub async fn publish(
        &self,
        asset_type: AssetType,
        asset: &Asset,
        content: Vec<u8>,
    ) -> Result<String, GenerationError> {
        let key = asset_type.artifact_key(&asset.id);
        Ok(self.store.put(&key, content).await?)
    }
}
