use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::outline::Outline;
use super::{Generator, GeneratorDeps};
use crate::asset::{Asset, AssetType};
use crate::error::GenerationError;

/// Narration pace used for duration estimates.
const WORDS_PER_SECOND: f64 = 2.5;
const MIN_SCENE_SECS: u32 = 5;

/// Everything a renderer needs to produce the explainer video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPackage {
    pub asset_id: String,
    pub title: String,
    pub audience: String,
    pub tone: String,
    pub scenes: Vec<Scene>,
    pub total_duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub number: usize,
    pub title: String,
    /// On-screen text.
    pub script: Vec<String>,
    pub narration: String,
    pub visuals: Vec<String>,
    pub duration_secs: u32,
}

/// Produces a JSON production package: script, narration and visual cues
/// per scene.
pub struct VideoGenerator {
    deps: GeneratorDeps,
}

impl VideoGenerator {
    pub fn new(deps: GeneratorDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Generator for VideoGenerator {
    fn asset_type(&self) -> AssetType {
        AssetType::Video
    }

    async fn generate(&self, asset: &Asset, text: &str) -> Result<String, GenerationError> {
        let outline = self.deps.draft(AssetType::Video, asset, text).await?;
        let package = build_package(asset, &outline);
        debug!(
            scenes = package.scenes.len(),
            duration_secs = package.total_duration_secs,
            "Built video package"
        );

        let bytes = serde_json::to_vec_pretty(&package)
            .map_err(|e| GenerationError::Render(e.to_string()))?;
        self.deps.publish(AssetType::Video, asset, bytes).await
    }
}

pub fn build_package(asset: &Asset, outline: &Outline) -> VideoPackage {
    let mut scenes = Vec::new();

    let opening = if outline.intro.is_empty() {
        format!(
            "This short video walks {} through {}.",
            asset.audience().to_lowercase(),
            outline.title
        )
    } else {
        outline.intro.join(" ")
    };
    scenes.push(scene(
        outline.title.clone(),
        vec![outline.title.clone()],
        opening,
        vec![
            "Title card".to_string(),
            format!("Presenter introduces \"{}\"", outline.title),
        ],
    ));

    for section in &outline.sections {
        let narration = if section.points.is_empty() {
            format!("Next: {}.", section.heading)
        } else {
            section
                .points
                .iter()
                .map(|p| sentence(p))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut visuals = vec![format!("Section card: {}", section.heading)];
        visuals.extend(
            section
                .points
                .iter()
                .take(3)
                .map(|p| format!("Illustration: {}", p)),
        );
        scenes.push(scene(
            section.heading.clone(),
            section.points.clone(),
            narration,
            visuals,
        ));
    }

    let mut closing = match outline.sections.len() {
        0 => format!("That covers {}.", outline.title),
        n => format!("That covers the {} key parts of {}.", n, outline.title),
    };
    if let Some(compliance) = asset.compliance_text() {
        closing.push(' ');
        closing.push_str(&sentence(compliance));
    }
    let mut closing_script = vec!["Recap".to_string()];
    closing_script.extend(asset.compliance_text().map(str::to_string));
    scenes.push(scene(
        "Recap".to_string(),
        closing_script,
        closing,
        vec!["Summary card listing each section".to_string()],
    ));

    for (i, s) in scenes.iter_mut().enumerate() {
        s.number = i + 1;
    }
    let total_duration_secs = scenes.iter().map(|s| s.duration_secs).sum();

    VideoPackage {
        asset_id: asset.id.clone(),
        title: outline.title.clone(),
        audience: asset.audience().to_string(),
        tone: asset.tone().to_string(),
        scenes,
        total_duration_secs,
    }
}

fn scene(title: String, script: Vec<String>, narration: String, visuals: Vec<String>) -> Scene {
    let duration_secs = narration_secs(&narration);
    Scene {
        number: 0,
        title,
        script,
        narration,
        visuals,
        duration_secs,
    }
}

pub fn narration_secs(narration: &str) -> u32 {
    let words = narration.split_whitespace().count() as f64;
    ((words / WORDS_PER_SECOND).ceil() as u32).max(MIN_SCENE_SECS)
}

fn sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{}.", trimmed)
    }
}
