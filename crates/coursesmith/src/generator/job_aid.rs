use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use super::outline::Outline;
use super::{Generator, GeneratorDeps};
use crate::asset::{Asset, AssetType};
use crate::error::GenerationError;

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 54;
const FOOTER_Y: i64 = 30;
/// Characters per line at 10pt Helvetica inside the margins.
const WRAP_CHARS: usize = 88;

/// Compact printable checklist as a PDF.
pub struct JobAidGenerator {
    deps: GeneratorDeps,
}

impl JobAidGenerator {
    pub fn new(deps: GeneratorDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Generator for JobAidGenerator {
    fn asset_type(&self) -> AssetType {
        AssetType::JobAid
    }

    async fn generate(&self, asset: &Asset, text: &str) -> Result<String, GenerationError> {
        let outline = self.deps.draft(AssetType::JobAid, asset, text).await?;
        let pdf = render_pdf(asset, &outline)?;
        debug!(bytes = pdf.len(), "Rendered job aid");
        self.deps.publish(AssetType::JobAid, asset, pdf).await
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Title(String),
    Meta(String),
    Heading(String),
    /// A checklist item; continuation lines of a wrapped item carry no box.
    Item { text: String, boxed: bool },
    Note(String),
}

impl Line {
    fn font(&self) -> (&'static str, i64) {
        match self {
            Line::Title(_) => ("F2", 16),
            Line::Heading(_) => ("F2", 12),
            Line::Meta(_) | Line::Note(_) => ("F1", 9),
            Line::Item { .. } => ("F1", 10),
        }
    }

    /// Vertical space consumed, including spacing above.
    fn advance(&self) -> i64 {
        match self {
            Line::Title(_) => 24,
            Line::Heading(_) => 22,
            Line::Meta(_) | Line::Note(_) => 13,
            Line::Item { .. } => 14,
        }
    }
}

fn layout(asset: &Asset, outline: &Outline) -> Vec<Line> {
    let mut lines = vec![
        Line::Title(outline.title.clone()),
        Line::Meta(format!(
            "Job aid for {} - Source: {}",
            asset.audience(),
            asset.document_name()
        )),
    ];

    push_items(&mut lines, &outline.intro);
    for section in &outline.sections {
        for chunk in wrap(&section.heading, WRAP_CHARS - 20) {
            lines.push(Line::Heading(chunk));
        }
        push_items(&mut lines, &section.points);
    }

    if outline.is_empty() {
        lines.push(Line::Note(
            "No checklist items could be derived from the source document.".to_string(),
        ));
    }

    if let Some(compliance) = asset.compliance_text() {
        for chunk in wrap(compliance, WRAP_CHARS + 8) {
            lines.push(Line::Note(chunk));
        }
    }

    lines
}

fn push_items(lines: &mut Vec<Line>, points: &[String]) {
    for point in points {
        for (i, chunk) in wrap(point, WRAP_CHARS).into_iter().enumerate() {
            lines.push(Line::Item {
                text: chunk,
                boxed: i == 0,
            });
        }
    }
}

fn paginate(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let usable = PAGE_HEIGHT - 2 * MARGIN;
    let mut pages = vec![Vec::new()];
    let mut used = 0;
    for line in lines {
        let advance = line.advance();
        if used + advance > usable && pages.last().is_some_and(|p| !p.is_empty()) {
            pages.push(Vec::new());
            used = 0;
        }
        used += advance;
        if let Some(page) = pages.last_mut() {
            page.push(line);
        }
    }
    pages
}

fn page_content(lines: &[Line], page: usize, total: usize) -> String {
    let mut content = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    content.push_str("0.5 w\n");

    for line in lines {
        y -= line.advance();
        let (font, size) = line.font();
        let (x, text) = match line {
            Line::Item { text, boxed } => {
                if *boxed {
                    content.push_str(&format!("{} {} 8 8 re S\n", MARGIN, y - 1));
                }
                (MARGIN + 14, text.as_str())
            }
            Line::Title(text) | Line::Meta(text) | Line::Heading(text) | Line::Note(text) => {
                (MARGIN, text.as_str())
            }
        };
        content.push_str(&format!(
            "BT /{} {} Tf {} {} Td ({}) Tj ET\n",
            font,
            size,
            x,
            y,
            escape_pdf_string(text)
        ));
    }

    content.push_str(&format!(
        "BT /F1 8 Tf {} {} Td (Page {} of {}) Tj ET\n",
        PAGE_WIDTH - MARGIN - 50,
        FOOTER_Y,
        page,
        total
    ));
    content
}

pub fn render_pdf(asset: &Asset, outline: &Outline) -> Result<Vec<u8>, GenerationError> {
    let pages = paginate(layout(asset, outline));

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for (i, lines) in pages.iter().enumerate() {
        let content = page_content(lines, i + 1, total);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| GenerationError::Render(e.to_string()))?;
    Ok(buffer)
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        if word.is_empty() {
            continue;
        }
        let word: String = word.into_iter().collect();
        let needed = usize::from(!current.is_empty()) + word.chars().count();
        if current.chars().count() + needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Escapes a PDF literal string for the WinAnsi-encoded standard fonts.
/// Non-ASCII characters are written as octal codes so the content stream
/// stays ASCII; anything the encoding lacks becomes `?`.
fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii() && !c.is_control() => out.push(c),
            c if c.is_whitespace() => out.push(' '),
            c => match win_ansi_code(c) {
                Some(code) => out.push_str(&format!("\\{:03o}", code)),
                None => out.push('?'),
            },
        }
    }
    out
}

fn win_ansi_code(c: char) -> Option<u8> {
    match c {
        '\u{20AC}' => Some(0x80),
        '\u{2026}' => Some(0x85),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201C}' => Some(0x93),
        '\u{201D}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        '\u{2122}' => Some(0x99),
        // Latin-1 Supplement maps one to one.
        '\u{A1}'..='\u{FF}' => Some(c as u8),
        _ => None,
    }
}
