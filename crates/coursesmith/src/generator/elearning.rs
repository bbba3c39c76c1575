use async_trait::async_trait;
use tracing::debug;

use super::markup::{escape_html, truncate_chars};
use super::outline::{Outline, Section};
use super::{Generator, GeneratorDeps};
use crate::asset::{Asset, AssetType};
use crate::error::GenerationError;

const MAX_OBJECTIVES: usize = 6;
const MAX_QUESTIONS: usize = 5;
const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Distractors used when the outline has too few sections to draw from.
const GENERIC_DISTRACTORS: [&str; 3] = [
    "This step is optional and may be skipped when time is short.",
    "Only managers need to be aware of this.",
    "This is handled automatically and requires no action.",
];

/// Builds a self-contained HTML module.
pub struct ELearningGenerator {
    deps: GeneratorDeps,
}

impl ELearningGenerator {
    pub fn new(deps: GeneratorDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Generator for ELearningGenerator {
    fn asset_type(&self) -> AssetType {
        AssetType::ELearning
    }

    async fn generate(&self, asset: &Asset, text: &str) -> Result<String, GenerationError> {
        let outline = self.deps.draft(AssetType::ELearning, asset, text).await?;
        let html = render(asset, &outline);
        debug!(sections = outline.sections.len(), "Rendered e-learning module");
        self.deps
            .publish(AssetType::ELearning, asset, html.into_bytes())
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeCheck {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

pub fn objectives(outline: &Outline) -> Vec<String> {
    let mut objectives: Vec<String> = outline
        .sections
        .iter()
        .take(MAX_OBJECTIVES)
        .map(|s| format!("Explain {}", lowercase_first(&s.heading)))
        .collect();
    if objectives.is_empty() {
        objectives.push(format!("Recall the key points of {}", outline.title));
    }
    objectives
}

/// One multiple-choice question per section that has content.
///
/// The correct option is the section's first point; distractors are first
/// points of other sections. The correct option's position rotates per
/// question.
pub fn knowledge_checks(outline: &Outline) -> Vec<KnowledgeCheck> {
    let candidates: Vec<&Section> = outline
        .sections
        .iter()
        .filter(|s| !s.points.is_empty())
        .collect();

    candidates
        .iter()
        .take(MAX_QUESTIONS)
        .enumerate()
        .map(|(i, section)| {
            let answer = section.points[0].clone();
            let mut distractors: Vec<String> = candidates
                .iter()
                .filter(|other| other.heading != section.heading)
                .map(|other| other.points[0].clone())
                .filter(|p| *p != answer)
                .take(OPTION_LABELS.len() - 1)
                .collect();
            for generic in GENERIC_DISTRACTORS {
                if distractors.len() >= OPTION_LABELS.len() - 1 {
                    break;
                }
                distractors.push(generic.to_string());
            }

            let correct = i % OPTION_LABELS.len();
            let mut options = distractors;
            options.insert(correct.min(options.len()), answer);

            KnowledgeCheck {
                question: format!(
                    "Which statement is correct about \"{}\"?",
                    section.heading
                ),
                correct: correct.min(options.len() - 1),
                options,
            }
        })
        .collect()
}

pub fn render(asset: &Asset, outline: &Outline) -> String {
    let mut html = String::new();
    let title = escape_html(&outline.title);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", title));
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n<main class=\"module\">\n");
    html.push_str(&format!(
        "<header>\n<h1>{}</h1>\n<p class=\"meta\">Audience: {} &middot; Tone: {} &middot; Source: {}</p>\n</header>\n",
        title,
        escape_html(asset.audience()),
        escape_html(asset.tone()),
        escape_html(asset.document_name()),
    ));

    html.push_str("<section class=\"objectives\">\n<h2>Learning objectives</h2>\n<ul>\n");
    for objective in objectives(outline) {
        html.push_str(&format!("<li>{}</li>\n", escape_html(&objective)));
    }
    html.push_str("</ul>\n</section>\n");

    if !outline.intro.is_empty() {
        html.push_str("<section class=\"introduction\">\n");
        for point in &outline.intro {
            html.push_str(&format!("<p>{}</p>\n", escape_html(point)));
        }
        html.push_str("</section>\n");
    }

    for (i, section) in outline.sections.iter().enumerate() {
        html.push_str(&format!(
            "<section class=\"topic\" id=\"topic-{n}\" data-interactive=\"accordion\">\n<h2>{n}. {heading}</h2>\n",
            n = i + 1,
            heading = escape_html(&section.heading),
        ));
        if !section.points.is_empty() {
            html.push_str("<ul>\n");
            for point in &section.points {
                html.push_str(&format!("<li>{}</li>\n", escape_html(point)));
            }
            html.push_str("</ul>\n");
        }
        html.push_str(&format!(
            "<div class=\"reflection\" data-interactive=\"reflection\">How does &quot;{}&quot; apply to your role?</div>\n</section>\n",
            escape_html(&truncate_chars(&section.heading, 60)),
        ));
    }

    let checks = knowledge_checks(outline);
    if !checks.is_empty() {
        html.push_str("<section class=\"knowledge-check\" data-interactive=\"quiz\">\n<h2>Knowledge check</h2>\n");
        for (q, check) in checks.iter().enumerate() {
            html.push_str(&format!(
                "<fieldset class=\"question\" id=\"question-{}\">\n<legend>{}</legend>\n",
                q + 1,
                escape_html(&check.question)
            ));
            for (o, option) in check.options.iter().enumerate() {
                html.push_str(&format!(
                    "<label><input type=\"radio\" name=\"question-{q}\" value=\"{label}\" data-correct=\"{correct}\"> {label}. {text}</label>\n",
                    q = q + 1,
                    label = OPTION_LABELS[o],
                    correct = o == check.correct,
                    text = escape_html(option),
                ));
            }
            html.push_str(&format!(
                "<details class=\"answer\"><summary>Show answer</summary>{}. {}</details>\n</fieldset>\n",
                OPTION_LABELS[check.correct],
                escape_html(&check.options[check.correct]),
            ));
        }
        html.push_str("</section>\n");
    }

    html.push_str("<section class=\"summary\">\n<h2>Summary</h2>\n");
    if outline.sections.is_empty() {
        html.push_str(&format!(
            "<p>This module covered {}.</p>\n",
            escape_html(&outline.title)
        ));
    } else {
        html.push_str("<p>In this module you covered:</p>\n<ul>\n");
        for section in &outline.sections {
            html.push_str(&format!("<li>{}</li>\n", escape_html(&section.heading)));
        }
        html.push_str("</ul>\n");
    }
    if let Some(compliance) = asset.compliance_text() {
        html.push_str(&format!(
            "<aside class=\"compliance\">{}</aside>\n",
            escape_html(compliance)
        ));
    }
    html.push_str("</section>\n</main>\n</body>\n</html>\n");
    html
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        // Leave acronyms ("SOP", "HR") alone.
        Some(first) if !chars.clone().next().is_some_and(char::is_uppercase) => {
            first.to_lowercase().chain(chars).collect()
        }
        _ => text.to_string(),
    }
}

const STYLE: &str = "<style>\n\
body{font-family:system-ui,sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem;line-height:1.5}\n\
.meta{color:#555}\n\
.topic,.objectives,.knowledge-check,.summary{border-top:1px solid #ddd;padding-top:1rem}\n\
.reflection{background:#f4f7fb;padding:.5rem 1rem;border-left:4px solid #3a6ea5}\n\
.question{margin-bottom:1rem}\n\
.question label{display:block}\n\
.compliance{background:#fff8e1;padding:.75rem 1rem;border-left:4px solid #e0a800}\n\
</style>\n";
