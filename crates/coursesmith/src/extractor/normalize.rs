//! Text normalization shared by every document source.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_HIDDEN_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|head|noscript)\b[^>]*>.*?</(script|style|head|noscript)\s*>")
        .unwrap()
});
static RE_LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").unwrap());
static RE_BLOCK_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(br|p|div|h[1-6]|ul|ol|li|tr|table|section|article|header|footer|blockquote)\b[^>]*>",
    )
    .unwrap()
});
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]{1,6}|[0-9]{1,7});").unwrap());

/// Cheap sniff for HTML payloads served without a useful content type.
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text
        .trim_start()
        .chars()
        .take(64)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Reduces an HTML document to its readable text, one block per line.
pub fn html_to_text(html: &str) -> String {
    let text = RE_COMMENT.replace_all(html, "");
    let text = RE_HIDDEN_BLOCK.replace_all(&text, "");
    let text = RE_LIST_ITEM.replace_all(&text, "\n- ");
    let text = RE_BLOCK_BOUNDARY.replace_all(&text, "\n");
    let text = RE_TAG.replace_all(&text, "");
    decode_entities(&text)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    let text = RE_NUMERIC_ENTITY.replace_all(text, |caps: &Captures<'_>| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    // `&amp;` last, so `&amp;lt;` decodes to the literal `&lt;`.
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Normalizes line endings and whitespace.
///
/// Every line is trimmed with inner whitespace collapsed, control characters
/// are dropped, and runs of blank lines collapse to a single blank line.
pub fn normalize_text(text: &str) -> String {
    let text = text.trim_start_matches('\u{feff}');
    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for raw_line in text.split(['\n', '\r']) {
        let line: String = raw_line
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .filter(|c| !c.is_control())
            .collect();

        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }

        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        pending_blank = false;
        out.push_str(&line);
    }

    out
}
