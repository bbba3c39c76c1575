//! Secret resolution for the completion-service API key.
//!
//! Sources are tried in priority order:
//!
//! 1. **Direct value** - local testing (`"api_key": "sk-..."`)
//! 2. **File reference** - Docker secrets (`"api_key_file": "/run/secrets/llm_key"`)
//! 3. **Env var reference** - production (`"api_key_env": "OPENAI_API_KEY"`)

use secrecy::SecretString;
use std::fs;

use crate::config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|e| SecretError::FileReadError {
                path: expanded,
                source: e,
            });
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            // Env vars written by orchestration tooling often carry a trailing newline.
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Resolves the completion-service key, or `None` when the worker should run
/// with the offline client.
///
/// Only the implicit env-var source is optional: an explicitly configured
/// value or file that cannot be read is still an error.
pub fn resolve_api_key(llm: &LlmConfig) -> Result<Option<SecretString>> {
    match resolve_secret(
        llm.api_key.as_deref(),
        llm.api_key_file.as_deref(),
        llm.api_key_env.as_deref(),
    ) {
        Ok(secret) if secrecy::ExposeSecret::expose_secret(&secret).is_empty() => Ok(None),
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` or `~/` to the current user's home directory.
/// `~user/...` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("COURSESMITH_TEST_SECRET_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("COURSESMITH_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("COURSESMITH_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "  file_value  ").unwrap();

        std::env::set_var("COURSESMITH_TEST_SECRET_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("COURSESMITH_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("COURSESMITH_TEST_SECRET_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_and_empty_strings_ignored() {
        std::env::set_var("COURSESMITH_TEST_SECRET_3", "env_value\n");
        let result = resolve_secret(Some(""), Some(""), Some("COURSESMITH_TEST_SECRET_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("COURSESMITH_TEST_SECRET_3");
    }

    #[test]
    fn test_no_source_error() {
        let result = resolve_secret(None, None, None);
        assert!(matches!(result, Err(SecretError::NoSourceProvided)));
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/secret"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_missing_env_key_means_offline() {
        let llm = LlmConfig {
            api_key_env: Some("COURSESMITH_DEFINITELY_UNSET_KEY".to_string()),
            ..LlmConfig::default()
        };
        assert!(resolve_api_key(&llm).unwrap().is_none());
    }

    #[test]
    fn test_missing_key_file_is_still_an_error() {
        let llm = LlmConfig {
            api_key_file: Some("/nonexistent/llm_key".to_string()),
            ..LlmConfig::default()
        };
        assert!(resolve_api_key(&llm).is_err());
    }

    #[test]
    fn test_direct_key_resolves() {
        let llm = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let key = resolve_api_key(&llm).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/run/secrets/key"), "/run/secrets/key");
        assert_eq!(expand_home("~alice/key"), "~alice/key");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/key"),
                format!("{}/key", home.to_string_lossy())
            );
        }
    }
}
