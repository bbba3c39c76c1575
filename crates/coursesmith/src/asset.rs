//! Asset records and their closed type/status enumerations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

const DEFAULT_AUDIENCE: &str = "General employees";
const DEFAULT_TONE: &str = "Professional";
const UNTITLED_DOCUMENT: &str = "Untitled document";

/// Training format an asset is transformed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetType {
    #[serde(rename = "e-learning")]
    ELearning,
    Video,
    ProcessMap,
    JobAid,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::ELearning,
        AssetType::Video,
        AssetType::ProcessMap,
        AssetType::JobAid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::ELearning => "e-learning",
            AssetType::Video => "video",
            AssetType::ProcessMap => "process-map",
            AssetType::JobAid => "job-aid",
        }
    }

    /// Object key of the artifact produced for `asset_id`. Deterministic, so a
    /// retried attempt overwrites the earlier object instead of adding one.
    pub fn artifact_key(&self, asset_id: &str) -> String {
        match self {
            AssetType::ELearning => format!("elearning_{}.html", asset_id),
            AssetType::Video => format!("video_{}.json", asset_id),
            AssetType::ProcessMap => format!("process_map_{}.html", asset_id),
            AssetType::JobAid => format!("job_aid_{}.pdf", asset_id),
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GenerationError::UnsupportedType(s.to_string()))
    }
}

/// Lifecycle status. `Processing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Processing,
    Completed,
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Processing => "processing",
            AssetStatus::Completed => "completed",
            AssetStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AssetStatus::Processing)
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(AssetStatus::Processing),
            "completed" => Ok(AssetStatus::Completed),
            "failed" => Ok(AssetStatus::Failed),
            other => Err(format!("unknown asset status '{}'", other)),
        }
    }
}

/// A row of the `assets` table.
///
/// `asset_type` stays raw text: rows are written by an external creation flow
/// and an unknown type must still be readable so it can be failed explicitly.
/// Timestamps are `None` when the stored value cannot be read as a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub asset_type: String,
    pub status: AssetStatus,
    pub original_document_url: String,
    pub original_document_name: String,
    pub audience: Option<String>,
    pub tone: Option<String>,
    pub compliance_text: Option<String>,
    pub output_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Asset {
    pub fn audience(&self) -> &str {
        non_blank(self.audience.as_deref()).unwrap_or(DEFAULT_AUDIENCE)
    }

    pub fn tone(&self) -> &str {
        non_blank(self.tone.as_deref()).unwrap_or(DEFAULT_TONE)
    }

    pub fn compliance_text(&self) -> Option<&str> {
        non_blank(self.compliance_text.as_deref())
    }

    /// Display name of the source document, never empty.
    pub fn document_name(&self) -> &str {
        non_blank(Some(self.original_document_name.as_str())).unwrap_or(UNTITLED_DOCUMENT)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Fields supplied by the creation flow when inserting a row.
#[derive(Debug, Clone, Default)]
pub struct NewAsset {
    /// Generated (UUID v4) when `None`.
    pub id: Option<String>,
    pub asset_type: String,
    pub original_document_url: String,
    pub original_document_name: String,
    pub audience: Option<String>,
    pub tone: Option<String>,
    pub compliance_text: Option<String>,
}

impl NewAsset {
    pub fn new(asset_type: impl Into<String>, original_document_url: impl Into<String>) -> Self {
        Self {
            asset_type: asset_type.into(),
            original_document_url: original_document_url.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.original_document_name = name.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = Some(tone.into());
        self
    }

    pub fn with_compliance_text(mut self, text: impl Into<String>) -> Self {
        self.compliance_text = Some(text.into());
        self
    }
}

/// Terminal transition written by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Completed { output_url: String },
    Failed { reason: String },
}

impl StatusUpdate {
    pub fn status(&self) -> AssetStatus {
        match self {
            StatusUpdate::Completed { .. } => AssetStatus::Completed,
            StatusUpdate::Failed { .. } => AssetStatus::Failed,
        }
    }
}
