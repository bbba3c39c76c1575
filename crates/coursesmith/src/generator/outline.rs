//! Outline parsing shared by all formats.
//!
//! Accepts Markdown-style drafts (`#` headings, `-`/`*` bullets, numbered
//! lists) and plain normalized documents alike. Parsing is total: any input,
//! including empty or unstructured text, yields an outline.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static RE_MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s*(.*?)\s*#*\s*$").unwrap());
static RE_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*+•▪]|\[[ xX]?\])\s+(.+)$").unwrap());
static RE_NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\(?\d{1,3}[.)]|[A-Za-z][.)]|(?i:step)\s+\d{1,3}[.:)]?)\s+(.+)$").unwrap()
});
static RE_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*|__|`").unwrap());

/// Longest line treated as a plain-text heading.
const MAX_HEADING_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: String,
    pub points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outline {
    pub title: String,
    /// Points that appear before the first section heading.
    pub intro: Vec<String>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Heading,
    Bullet,
    Numbered,
    Text,
}

impl Outline {
    pub fn parse(text: &str, fallback_title: &str) -> Self {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let kinds: Vec<LineKind> = lines.iter().map(|l| classify(l)).collect();

        let mut title: Option<String> = None;
        let mut intro = Vec::new();
        let mut sections: Vec<Section> = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let prev = if i == 0 { LineKind::Blank } else { kinds[i - 1] };
            let next = kinds.get(i + 1).copied().unwrap_or(LineKind::Blank);

            match kinds[i] {
                LineKind::Blank => {}
                LineKind::Heading => {
                    let (level, heading) = markdown_heading(line);
                    if !has_words(&heading) {
                        continue;
                    }
                    if level == 1 && title.is_none() && sections.is_empty() && intro.is_empty() {
                        title = Some(heading);
                    } else {
                        sections.push(Section {
                            heading,
                            points: Vec::new(),
                        });
                    }
                }
                kind => {
                    let content = clean(strip_marker(line, kind));
                    if !has_words(&content) {
                        continue;
                    }

                    let starts_paragraph = prev == LineKind::Blank;
                    let opens_block = next != LineKind::Blank && next != kind;
                    let heading_like = kind != LineKind::Bullet
                        && starts_paragraph
                        && is_heading_text(&content);

                    if title.is_none()
                        && kind == LineKind::Text
                        && i == first_content(&kinds)
                        && is_heading_text(&content)
                    {
                        title = Some(content.trim_end_matches(':').trim().to_string());
                    } else if heading_like && (opens_block || line.ends_with(':')) {
                        sections.push(Section {
                            heading: content.trim_end_matches(':').trim().to_string(),
                            points: Vec::new(),
                        });
                    } else if let Some(section) = sections.last_mut() {
                        section.points.push(content);
                    } else {
                        intro.push(content);
                    }
                }
            }
        }

        let title = title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| clean(fallback_title));

        Self {
            title,
            intro,
            sections,
        }
    }

    /// True when the text carried no content beyond (at most) a title.
    pub fn is_empty(&self) -> bool {
        self.intro.is_empty() && self.sections.is_empty()
    }

    /// Workflow stages: the sections, or when there are none, one stage per
    /// intro point.
    pub fn stages(&self) -> Vec<Section> {
        if !self.sections.is_empty() {
            return self.sections.clone();
        }
        self.intro
            .iter()
            .map(|p| Section {
                heading: p.clone(),
                points: Vec::new(),
            })
            .collect()
    }

    /// Every point in document order.
    pub fn all_points(&self) -> impl Iterator<Item = &str> {
        self.intro
            .iter()
            .chain(self.sections.iter().flat_map(|s| s.points.iter()))
            .map(String::as_str)
    }
}

fn classify(line: &str) -> LineKind {
    if line.is_empty() {
        LineKind::Blank
    } else if RE_MD_HEADING.is_match(line) {
        LineKind::Heading
    } else if RE_BULLET.is_match(line) {
        LineKind::Bullet
    } else if RE_NUMBERED.is_match(line) {
        LineKind::Numbered
    } else {
        LineKind::Text
    }
}

fn first_content(kinds: &[LineKind]) -> usize {
    kinds
        .iter()
        .position(|k| *k != LineKind::Blank)
        .unwrap_or(0)
}

fn markdown_heading(line: &str) -> (usize, String) {
    match RE_MD_HEADING.captures(line) {
        Some(caps) => {
            let level = caps.get(1).map_or(1, |m| m.as_str().len());
            let text = caps.get(2).map_or("", |m| m.as_str());
            (level, clean(text))
        }
        None => (1, clean(line)),
    }
}

fn strip_marker(line: &str, kind: LineKind) -> &str {
    let re = match kind {
        LineKind::Bullet => &*RE_BULLET,
        LineKind::Numbered => &*RE_NUMBERED,
        _ => return line,
    };
    re.captures(line)
        .and_then(|c| c.get(1))
        .map_or(line, |m| m.as_str())
}

/// Short, and not a sentence.
fn is_heading_text(text: &str) -> bool {
    let trimmed = text.trim_end_matches(':');
    !trimmed.is_empty()
        && trimmed.chars().count() <= MAX_HEADING_CHARS
        && !trimmed.ends_with(['.', '!', '?', ';', ','])
}

fn has_words(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

fn clean(text: &str) -> String {
    RE_EMPHASIS
        .replace_all(text, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
