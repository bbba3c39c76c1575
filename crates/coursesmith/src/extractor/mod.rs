//! Document extraction: reference in, normalized plain text out.

pub mod normalize;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::error::{ConfigError, ExtractionError};
use crate::sanitize::redact_document_url;

pub use normalize::{html_to_text, normalize_text};

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Returns the document's normalized text. Never returns empty text:
    /// an empty document is an `ExtractionError::Empty`.
    async fn extract(&self, document_url: &str) -> Result<String, ExtractionError>;
}

/// Where a document reference points after scheme resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    Remote(String),
    Local(PathBuf),
}

const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Extractor for `http(s)://`, `file://`, `doc://` and plain path references.
///
/// `file://` and plain paths are rejected unless local paths are enabled.
pub struct SourceExtractor {
    documents_dir: PathBuf,
    http: reqwest::Client,
    allow_local_paths: bool,
    max_document_bytes: u64,
}

impl SourceExtractor {
    pub fn new<P: AsRef<Path>>(documents_dir: P, http: reqwest::Client) -> Self {
        Self {
            documents_dir: documents_dir.as_ref().to_path_buf(),
            http,
            allow_local_paths: false,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    pub fn with_local_paths(mut self, allow: bool) -> Self {
        self.allow_local_paths = allow;
        self
    }

    pub fn with_max_document_bytes(mut self, max: u64) -> Self {
        self.max_document_bytes = max;
        self
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(concat!("coursesmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self::new(&config.documents_dir, http)
            .with_local_paths(config.allow_local_paths)
            .with_max_document_bytes(config.max_document_bytes))
    }

    /// Maps a reference onto a fetchable location.
    pub fn resolve(&self, document_url: &str) -> Result<DocumentLocation, ExtractionError> {
        let url = document_url.trim();
        if url.is_empty() {
            return Err(ExtractionError::InvalidReference {
                url: String::new(),
                reason: "empty reference".to_string(),
            });
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(DocumentLocation::Remote(url.to_string()));
        }

        if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(ExtractionError::InvalidReference {
                    url: url.to_string(),
                    reason: "missing path".to_string(),
                });
            }
            return self.local_path(url, path);
        }

        if let Some(name) = url.strip_prefix("doc://") {
            let relative = Path::new(name);
            let confined = !name.is_empty()
                && relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
            if !confined {
                return Err(ExtractionError::InvalidReference {
                    url: url.to_string(),
                    reason: "document name must be a relative path inside the document store"
                        .to_string(),
                });
            }
            return Ok(DocumentLocation::Local(self.documents_dir.join(relative)));
        }

        if let Some((scheme, _)) = url.split_once("://") {
            return Err(ExtractionError::UnsupportedScheme(scheme.to_string()));
        }

        self.local_path(url, url)
    }

    fn local_path(&self, url: &str, path: &str) -> Result<DocumentLocation, ExtractionError> {
        if !self.allow_local_paths {
            return Err(ExtractionError::InvalidReference {
                url: redact_document_url(url),
                reason: "local paths are disabled, use a doc:// reference".to_string(),
            });
        }
        Ok(DocumentLocation::Local(PathBuf::from(path)))
    }

    fn too_large(&self, url: String) -> ExtractionError {
        ExtractionError::Unparseable {
            url,
            reason: format!("document is larger than {} bytes", self.max_document_bytes),
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<(Vec<u8>, bool), ExtractionError> {
        let unreachable = |reason: String| ExtractionError::Unreachable {
            url: redact_document_url(url),
            reason,
        };

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("HTTP {}", status)));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("html"));

        if response
            .content_length()
            .is_some_and(|len| len > self.max_document_bytes)
        {
            return Err(self.too_large(redact_document_url(url)));
        }

        // Content-Length may be absent or wrong, so the limit is also
        // enforced while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| unreachable(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_document_bytes {
                return Err(self.too_large(redact_document_url(url)));
            }
            body.extend_from_slice(&chunk);
        }

        Ok((body, is_html))
    }

    async fn read_local(&self, path: &Path) -> Result<(Vec<u8>, bool), ExtractionError> {
        let mime = mime_guess::from_path(path).first();
        if let Some(mime) = &mime {
            let textual = mime.type_() == mime_guess::mime::TEXT
                || matches!(mime.subtype().as_str(), "json" | "xml" | "xhtml+xml");
            if !textual {
                return Err(ExtractionError::Unparseable {
                    url: crate::sanitize::redact_path(path),
                    reason: format!("{} documents are not supported", mime.essence_str()),
                });
            }
        }
        let is_html = mime.is_some_and(|m| m.subtype().as_str().contains("html"));

        let io_error = |e: std::io::Error| ExtractionError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let size = tokio::fs::metadata(path).await.map_err(io_error)?.len();
        if size > self.max_document_bytes {
            return Err(self.too_large(crate::sanitize::redact_path(path)));
        }

        let bytes = tokio::fs::read(path).await.map_err(io_error)?;

        Ok((bytes, is_html))
    }
}

#[async_trait]
impl DocumentExtractor for SourceExtractor {
    async fn extract(&self, document_url: &str) -> Result<String, ExtractionError> {
        let location = self.resolve(document_url)?;
        let (bytes, is_html) = match &location {
            DocumentLocation::Remote(url) => self.fetch_remote(url).await?,
            DocumentLocation::Local(path) => self.read_local(path).await?,
        };

        let text = decode_document(document_url, bytes, is_html)?;
        debug!(
            document = %redact_document_url(document_url),
            chars = text.len(),
            "Extracted document text"
        );
        Ok(text)
    }
}

/// Decodes raw document bytes into normalized text.
pub fn decode_document(
    document_url: &str,
    bytes: Vec<u8>,
    is_html: bool,
) -> Result<String, ExtractionError> {
    let raw = String::from_utf8(bytes).map_err(|e| ExtractionError::Unparseable {
        url: redact_document_url(document_url),
        reason: format!("not valid UTF-8 text ({})", e.utf8_error()),
    })?;

    let text = if is_html || normalize::looks_like_html(&raw) {
        normalize_text(&html_to_text(&raw))
    } else {
        normalize_text(&raw)
    };

    if text.is_empty() {
        return Err(ExtractionError::Empty {
            url: redact_document_url(document_url),
        });
    }

    Ok(text)
}
