//! Prompt construction per format.

use crate::asset::{Asset, AssetType};
use crate::generator::client::CompletionRequest;
use crate::sanitize::sanitize_for_prompt;

/// Characters of document text sent to the completion service.
pub const MAX_DOCUMENT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You are an instructional designer who turns workplace documents \
(SOPs, policies, knowledge articles) into training material. Use only facts from the \
source document. Respond ONLY with a Markdown outline: one '# ' title line, '## ' section \
headings, and '- ' bullet points under each heading. No other text.";

pub fn build_request(asset_type: AssetType, asset: &Asset, text: &str, max_tokens: u32) -> CompletionRequest {
    let audience = sanitize_for_prompt(asset.audience());
    let tone = sanitize_for_prompt(asset.tone());
    let document_name = sanitize_for_prompt(asset.document_name());

    let mut instructions = format!(
        "Document: {name}\nAudience: {audience}\nTone: {tone}\n\n{task}",
        name = document_name,
        audience = audience,
        tone = tone,
        task = format_instructions(asset_type),
    );

    if let Some(compliance) = asset.compliance_text() {
        instructions.push_str(&format!(
            "\n\nThe following compliance statement must be reflected accurately:\n{}",
            sanitize_for_prompt(compliance)
        ));
    }

    let document: String = sanitize_for_prompt(text)
        .chars()
        .take(MAX_DOCUMENT_CHARS)
        .collect();

    CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        instructions,
        document,
        max_tokens,
    }
}

fn format_instructions(asset_type: AssetType) -> &'static str {
    match asset_type {
        AssetType::ELearning => {
            "Create an e-learning module outline. Use one '## ' section per learning topic \
             (3 to 6 topics). Under each topic list the key facts a learner must remember \
             as short bullet points; the first bullet is the most important fact."
        }
        AssetType::Video => {
            "Create a script outline for a short explainer video. Use one '## ' section per \
             scene (3 to 6 scenes). Under each scene list the narration lines as bullet points, \
             written to be spoken aloud."
        }
        AssetType::ProcessMap => {
            "Map the workflow described in the document. Use one '## ' section per process \
             stage, in execution order. Under each stage list the concrete steps performed, \
             starting each with a verb."
        }
        AssetType::JobAid => {
            "Create a one-page job aid. Use one '## ' section per task. Under each task list \
             checklist items as short imperative bullet points. Keep it compact."
        }
    }
}
