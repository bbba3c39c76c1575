//! Closed mapping from [`AssetType`] to its generator.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;

use super::client::client_from_config;
use super::{
    ELearningGenerator, Generator, GeneratorDeps, JobAidGenerator, ProcessMapGenerator,
    VideoGenerator,
};
use crate::asset::AssetType;
use crate::config::WorkerConfig;
use crate::error::{ConfigError, CoursesmithError, GenerationError};
use crate::storage::FileArtifactStore;

/// Dispatch table. Built once at startup with a generator for every
/// [`AssetType`]; lookups never fall through to anything dynamic.
#[derive(Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<AssetType, Arc<dyn Generator>>,
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("types", &self.supported_types())
            .finish()
    }
}

impl GeneratorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The four built-in generators sharing one set of capabilities.
    pub fn standard(deps: GeneratorDeps) -> Self {
        let generators: [Arc<dyn Generator>; 4] = [
            Arc::new(ELearningGenerator::new(deps.clone())),
            Arc::new(VideoGenerator::new(deps.clone())),
            Arc::new(ProcessMapGenerator::new(deps.clone())),
            Arc::new(JobAidGenerator::new(deps)),
        ];
        Self {
            generators: generators
                .into_iter()
                .map(|g| (g.asset_type(), g))
                .collect(),
        }
    }

    /// Standard registry writing artifacts to the configured directory.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, CoursesmithError> {
        let client = client_from_config(&config.llm, config.generation_timeout())?;
        let store = Arc::new(FileArtifactStore::new(
            &config.artifacts_dir,
            &config.public_base_url,
        ));
        info!(
            "Artifacts stored in {} and served from {}",
            config.artifacts_dir.display(),
            config.public_base_url
        );
        let deps = GeneratorDeps::new(client, store).with_max_tokens(config.llm.max_tokens);
        Ok(Self::standard(deps))
    }

    /// Looks up the generator for a raw `asset_type` value.
    ///
    /// Anything outside the closed enumeration is
    /// [`GenerationError::UnsupportedType`].
    pub fn resolve(&self, asset_type: &str) -> Result<Arc<dyn Generator>, GenerationError> {
        let parsed: AssetType = asset_type.parse()?;
        self.generators
            .get(&parsed)
            .cloned()
            .ok_or_else(|| GenerationError::UnsupportedType(asset_type.to_string()))
    }

    pub fn supported_types(&self) -> Vec<AssetType> {
        AssetType::ALL
            .into_iter()
            .filter(|t| self.generators.contains_key(t))
            .collect()
    }
}

/// Assembles a registry from individual generators, e.g. to swap one format
/// for a different implementation.
#[derive(Default)]
pub struct RegistryBuilder {
    generators: HashMap<AssetType, Arc<dyn Generator>>,
}

impl RegistryBuilder {
    /// Registers `generator` for its own type, replacing any earlier one.
    pub fn register(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generators.insert(generator.asset_type(), generator);
        self
    }

    /// Fails unless every asset type has a generator.
    pub fn build(self) -> Result<GeneratorRegistry, ConfigError> {
        let missing: Vec<&str> = AssetType::ALL
            .iter()
            .filter(|t| !self.generators.contains_key(*t))
            .map(|t| t.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Validation {
                message: format!("no generator registered for: {}", missing.join(", ")),
            });
        }
        Ok(GeneratorRegistry {
            generators: self.generators,
        })
    }
}
