use std::path::{Path, PathBuf};

use crate::config::schema::WorkerConfig;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/worker-config-v1.json");

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "COURSESMITH_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<WorkerConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<WorkerConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: WorkerConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// `$COURSESMITH_CONFIG`, else `~/.coursesmith/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".coursesmith").join("config.json")))
}

/// Loads an explicitly named file, or the default location when it exists.
/// A missing default file yields the built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<WorkerConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => load_config(&path),
        _ => {
            let config = WorkerConfig::default();
            validate_config(&config)?;
            Ok(config)
        }
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if !(config.public_base_url.starts_with("http://")
        || config.public_base_url.starts_with("https://"))
    {
        return Err(ConfigError::Validation {
            message: format!(
                "public_base_url must be an absolute http(s) URL, got '{}'",
                config.public_base_url
            ),
        });
    }

    if config.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "concurrency must be at least 1".to_string(),
        });
    }

    if config.idle_interval_secs == 0 || config.generation_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "idle_interval_secs and generation_timeout_secs must be positive".to_string(),
        });
    }

    if config.error_backoff_secs < config.idle_interval_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "error_backoff_secs ({}) must not be shorter than idle_interval_secs ({})",
                config.error_backoff_secs, config.idle_interval_secs
            ),
        });
    }

    Ok(())
}
