use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker configuration, loaded once at start and passed into every client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// SQLite file holding the `assets` table.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Root that `doc://` references resolve against.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    /// Where generated artifacts are written.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Public prefix returned in `output_url`.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_idle_interval_secs")]
    pub idle_interval_secs: u64,
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Accept `file://` and bare path references. Off by default: only
    /// `doc://` names under `documents_dir` are read from disk.
    #[serde(default)]
    pub allow_local_paths: bool,
    /// Largest source document read into memory.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl WorkerConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            database_path: default_database_path(),
            documents_dir: default_documents_dir(),
            artifacts_dir: default_artifacts_dir(),
            public_base_url: default_public_base_url(),
            idle_interval_secs: default_idle_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            concurrency: default_concurrency(),
            generation_timeout_secs: default_generation_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            allow_local_paths: false,
            max_document_bytes: default_max_document_bytes(),
            log_format: LogFormat::default(),
            llm: LlmConfig::default(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".coursesmith")
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path().unwrap_or_else(|| PathBuf::from("coursesmith.db"))
}

fn default_documents_dir() -> PathBuf {
    base_dir().join("documents")
}

fn default_artifacts_dir() -> PathBuf {
    base_dir().join("artifacts")
}

fn default_public_base_url() -> String {
    "http://localhost:8080/storage".to_string()
}

fn default_idle_interval_secs() -> u64 {
    10
}

fn default_error_backoff_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

fn default_generation_timeout_secs() -> u64 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_document_bytes() -> u64 {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// OpenAI-compatible completion endpoint. Without a resolvable API key the
/// worker falls back to the offline client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_tokens() -> u32 {
    600
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}
