use async_trait::async_trait;
use tracing::debug;

use super::markup::{escape_html, truncate_chars};
use super::outline::{Outline, Section};
use super::{Generator, GeneratorDeps};
use crate::asset::{Asset, AssetType};
use crate::error::GenerationError;

const NODE_WIDTH: u32 = 360;
const NODE_HEIGHT: u32 = 56;
const NODE_GAP: u32 = 40;
const MARGIN: u32 = 20;
const MAX_LABEL_CHARS: usize = 44;

/// Renders workflow stages as an interactive HTML page with an inline SVG.
pub struct ProcessMapGenerator {
    deps: GeneratorDeps,
}

impl ProcessMapGenerator {
    pub fn new(deps: GeneratorDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Generator for ProcessMapGenerator {
    fn asset_type(&self) -> AssetType {
        AssetType::ProcessMap
    }

    async fn generate(&self, asset: &Asset, text: &str) -> Result<String, GenerationError> {
        let outline = self.deps.draft(AssetType::ProcessMap, asset, text).await?;
        let stages = stages_for(&outline);
        debug!(stages = stages.len(), "Rendered process map");
        let html = render(asset, &outline.title, &stages);
        self.deps
            .publish(AssetType::ProcessMap, asset, html.into_bytes())
            .await
    }
}

/// The outline's stages, or a single stage named after the title when the
/// outline is empty.
pub fn stages_for(outline: &Outline) -> Vec<Section> {
    let stages = outline.stages();
    if stages.is_empty() {
        return vec![Section {
            heading: outline.title.clone(),
            points: Vec::new(),
        }];
    }
    stages
}

pub fn render_svg(stages: &[Section]) -> String {
    let count = stages.len() as u32;
    let width = NODE_WIDTH + 2 * MARGIN;
    let height = 2 * MARGIN + count * NODE_HEIGHT + count.saturating_sub(1) * NODE_GAP;
    let x = MARGIN;

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\" role=\"img\">\n",
        w = width,
        h = height
    );
    svg.push_str(
        "<defs><marker id=\"arrow\" markerWidth=\"10\" markerHeight=\"10\" refX=\"5\" refY=\"9\" orient=\"auto\"><path d=\"M0,0 L10,0 L5,10 z\" fill=\"#3a6ea5\"/></marker></defs>\n",
    );

    for (i, stage) in stages.iter().enumerate() {
        let y = MARGIN + i as u32 * (NODE_HEIGHT + NODE_GAP);
        svg.push_str(&format!(
            "<g class=\"stage\" data-stage=\"{n}\" tabindex=\"0\"><rect x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\" rx=\"8\"/><text x=\"{tx}\" y=\"{ty}\" text-anchor=\"middle\">{n}. {label}</text></g>\n",
            n = i + 1,
            x = x,
            y = y,
            w = NODE_WIDTH,
            h = NODE_HEIGHT,
            tx = x + NODE_WIDTH / 2,
            ty = y + NODE_HEIGHT / 2 + 5,
            label = escape_html(&truncate_chars(&stage.heading, MAX_LABEL_CHARS)),
        ));
        if i + 1 < stages.len() {
            let line_x = x + NODE_WIDTH / 2;
            svg.push_str(&format!(
                "<line class=\"flow\" x1=\"{lx}\" y1=\"{y1}\" x2=\"{lx}\" y2=\"{y2}\" marker-end=\"url(#arrow)\"/>\n",
                lx = line_x,
                y1 = y + NODE_HEIGHT,
                y2 = y + NODE_HEIGHT + NODE_GAP - 10,
            ));
        }
    }

    svg.push_str("</svg>\n");
    svg
}

pub fn render(asset: &Asset, title: &str, stages: &[Section]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!(
        "<h1>{}</h1>\n<p class=\"meta\">Process map for {} &middot; select a stage to see its steps</p>\n",
        escape_html(title),
        escape_html(asset.audience()),
    ));
    html.push_str("<div class=\"map\">\n");
    html.push_str(&render_svg(stages));
    html.push_str("<div class=\"details\">\n");
    for (i, stage) in stages.iter().enumerate() {
        html.push_str(&format!(
            "<section class=\"stage-detail\" id=\"stage-{}\" hidden>\n<h2>{}</h2>\n",
            i + 1,
            escape_html(&stage.heading)
        ));
        if stage.points.is_empty() {
            html.push_str("<p>No detailed steps recorded for this stage.</p>\n");
        } else {
            html.push_str("<ol>\n");
            for point in &stage.points {
                html.push_str(&format!("<li>{}</li>\n", escape_html(point)));
            }
            html.push_str("</ol>\n");
        }
        html.push_str("</section>\n");
    }
    html.push_str("</div>\n</div>\n");
    if let Some(compliance) = asset.compliance_text() {
        html.push_str(&format!(
            "<footer class=\"compliance\">{}</footer>\n",
            escape_html(compliance)
        ));
    }
    html.push_str(SCRIPT);
    html.push_str("</body>\n</html>\n");
    html
}

const STYLE: &str = "<style>\n\
body{font-family:system-ui,sans-serif;margin:2rem}\n\
.map{display:flex;gap:2rem;align-items:flex-start}\n\
.stage rect{fill:#eef3f9;stroke:#3a6ea5;stroke-width:2;cursor:pointer}\n\
.stage.active rect{fill:#cfe0f3}\n\
.stage text{font-size:14px;pointer-events:none}\n\
.flow{stroke:#3a6ea5;stroke-width:2}\n\
.compliance{margin-top:2rem;color:#5c4400}\n\
</style>\n";

const SCRIPT: &str = "<script>\n\
document.querySelectorAll('.stage').forEach(function (node) {\n\
  function show() {\n\
    document.querySelectorAll('.stage').forEach(function (n) { n.classList.remove('active'); });\n\
    document.querySelectorAll('.stage-detail').forEach(function (d) { d.hidden = true; });\n\
    node.classList.add('active');\n\
    document.getElementById('stage-' + node.dataset.stage).hidden = false;\n\
  }\n\
  node.addEventListener('click', show);\n\
  node.addEventListener('keydown', function (e) { if (e.key === 'Enter') { show(); } });\n\
});\n\
</script>\n";
