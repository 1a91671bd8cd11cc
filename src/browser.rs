// ABOUTME: Headless browser converter for the deckling application
// ABOUTME: Renders slide HTML in Chrome and turns measured elements into slide descriptions

use crate::convert::{self, SlideConverter};
use crate::errors::ConvertError;
use crate::layout::{LayoutPreset, PT_PER_PX, PX_PER_INCH};
use crate::resources::ImageSource;
use crate::slide::{
    Align, Background, Bullet, Color, Frame, Geometry, Paragraph, Picture, Placeholder, RunStyle,
    ShapeBox, SlideElement, SlideSpec, Stroke, TextBox, TextRun,
};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration for browser rendering
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub timeout_ms: u64,
    pub browser_path: Option<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30000, // 30 seconds
            browser_path: None,
        }
    }
}

/// Converts slides by measuring them in headless Chrome.
///
/// The browser is launched on first use and reused for later slides.
pub struct BrowserConverter {
    options: BrowserOptions,
    browser: Option<(LayoutPreset, Browser)>,
}

impl BrowserConverter {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            browser: None,
        }
    }

    fn browser_for(&mut self, layout: LayoutPreset) -> Result<&Browser, ConvertError> {
        let stale = !matches!(&self.browser, Some((l, _)) if *l == layout);
        if stale {
            self.browser = Some((layout, self.launch(layout)?));
        }
        self.browser
            .as_ref()
            .map(|(_, browser)| browser)
            .ok_or_else(|| ConvertError::Browser("browser unavailable".to_string()))
    }

    fn launch(&self, layout: LayoutPreset) -> Result<Browser, ConvertError> {
        let (width, height) = layout.size_px();

        let mut launch_options_builder = LaunchOptionsBuilder::default();
        launch_options_builder.window_size(Some((width, height)));
        launch_options_builder.headless(true);
        if let Some(browser_path) = &self.options.browser_path {
            launch_options_builder.path(Some(PathBuf::from(browser_path)));
        }

        let launch_options = launch_options_builder
            .build()
            .map_err(|e| ConvertError::Browser(format!("Failed to build browser options: {:?}", e)))?;

        info!("Launching headless browser at {}x{}", width, height);
        Browser::new(launch_options).map_err(|e| {
            let message = format!("Failed to launch browser: {}", e);
            warn!("{}", message);
            ConvertError::Browser(message)
        })
    }

    fn extract(&mut self, source: &Path, layout: LayoutPreset) -> Result<Extracted, ConvertError> {
        let html_path_abs = fs::canonicalize(source)?;
        let url = Url::from_file_path(&html_path_abs)
            .map_err(|_| ConvertError::Browser(format!("Cannot build a URL for {:?}", html_path_abs)))?;
        let timeout = Duration::from_millis(self.options.timeout_ms);

        let browser = self.browser_for(layout)?;
        let payload = with_tab(browser, |tab| {
            tab.set_default_timeout(timeout);

            info!("Opening page at URL: {}", url);
            tab.navigate_to(url.as_str())?;
            tab.wait_until_navigated()?;
            tab.wait_for_element_with_custom_timeout("body", timeout)?;

            let result = tab.evaluate(EXTRACT_SCRIPT, false)?;
            match result.value {
                Some(serde_json::Value::String(json)) => Ok(json),
                other => Err(ConvertError::Browser(format!(
                    "Extraction script returned {:?}",
                    other
                ))),
            }
        })?;

        serde_json::from_str(&payload)
            .map_err(|e| ConvertError::Browser(format!("Malformed extraction result: {}", e)))
    }
}

/// Run `work` in a fresh tab that is closed again whether or not it succeeds.
fn with_tab<T>(
    browser: &Browser,
    work: impl FnOnce(&Tab) -> Result<T, ConvertError>,
) -> Result<T, ConvertError> {
    let tab = browser.new_tab()?;
    let result = work(&*tab);
    if let Err(e) = tab.close(true) {
        debug!("Failed to close tab: {}", e);
    }
    result
}

impl SlideConverter for BrowserConverter {
    fn convert(&mut self, source: &Path, layout: LayoutPreset) -> Result<SlideSpec, ConvertError> {
        info!("Rendering slide in browser: {:?}", source);
        let extracted = self.extract(source, layout)?;
        let base_dir = source.parent().unwrap_or_else(|| Path::new("."));
        build_slide(extracted, layout, base_dir)
    }
}

/// Page measurements reported by the extraction script, in CSS pixels.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Extracted {
    width: f64,
    height: f64,
    scroll_width: f64,
    scroll_height: f64,
    background: Option<ExtractedBackground>,
    #[serde(default)]
    elements: Vec<ExtractedElement>,
    #[serde(default)]
    placeholders: Vec<ExtractedPlaceholder>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ExtractedBackground {
    Color { color: String },
    Image { src: String },
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Rect {
    fn to_frame(self) -> Frame {
        Frame::new(
            self.x / PX_PER_INCH,
            self.y / PX_PER_INCH,
            self.w / PX_PER_INCH,
            self.h / PX_PER_INCH,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ExtractedElement {
    Text {
        rect: Rect,
        paragraphs: Vec<ExtractedParagraph>,
    },
    Image {
        rect: Rect,
        src: String,
        #[serde(default)]
        alt: String,
    },
    Shape {
        rect: Rect,
        fill: Option<String>,
        #[serde(rename = "borderColor")]
        border_color: Option<String>,
        #[serde(default, rename = "borderWidth")]
        border_width: f64,
        #[serde(default)]
        radius: f64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedParagraph {
    runs: Vec<ExtractedRun>,
    #[serde(default)]
    align: String,
    /// `ul`, `ol` or absent.
    list: Option<String>,
    /// Line height in px, when not `normal`.
    line_height: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedRun {
    text: String,
    font_size: f64,
    font_family: String,
    bold: bool,
    italic: bool,
    underline: bool,
    color: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedPlaceholder {
    id: String,
    rect: Rect,
}

fn build_slide(
    extracted: Extracted,
    layout: LayoutPreset,
    base_dir: &Path,
) -> Result<SlideSpec, ConvertError> {
    convert::check_dimensions(
        layout,
        extracted.width / PX_PER_INCH,
        extracted.height / PX_PER_INCH,
    )?;

    let mut problems = extracted.errors;
    for element in &extracted.elements {
        if let ExtractedElement::Text { paragraphs, .. } = element {
            for paragraph in paragraphs.iter().filter(|p| p.list.is_some()) {
                let text: String = paragraph.runs.iter().map(|r| r.text.as_str()).collect();
                if let Some(problem) = convert::manual_bullet_problem(&text) {
                    problems.push(problem);
                }
            }
        }
    }
    if !problems.is_empty() {
        return Err(ConvertError::Validation(problems));
    }

    let overflow_w = (extracted.scroll_width - extracted.width).max(0.0);
    let overflow_h = (extracted.scroll_height - extracted.height).max(0.0);
    let (slide_w, slide_h) = layout.size_inches();
    convert::check_overflow(
        layout,
        slide_w + overflow_w / PX_PER_INCH,
        slide_h + overflow_h / PX_PER_INCH,
    )?;

    let background = match extracted.background {
        Some(ExtractedBackground::Image { src }) => {
            Some(Background::Image(ImageSource::resolve(&src, base_dir)?.load()?))
        }
        Some(ExtractedBackground::Color { color }) => Color::parse(&color).map(Background::Color),
        None => None,
    };
    let mut spec = SlideSpec {
        background,
        ..SlideSpec::default()
    };

    for element in extracted.elements {
        let converted = match element {
            ExtractedElement::Text { rect, paragraphs } => SlideElement::Text(TextBox {
                frame: rect.to_frame(),
                paragraphs: paragraphs.into_iter().map(build_paragraph).collect(),
            }),
            ExtractedElement::Image { rect, src, alt } => SlideElement::Picture(Picture {
                frame: rect.to_frame(),
                image: ImageSource::resolve(&src, base_dir)?.load()?,
                description: alt,
            }),
            ExtractedElement::Shape {
                rect,
                fill,
                border_color,
                border_width,
                radius,
            } => SlideElement::Shape(ShapeBox {
                frame: rect.to_frame(),
                geometry: if radius > 0.0 {
                    Geometry::RoundRect
                } else {
                    Geometry::Rect
                },
                fill: fill.as_deref().and_then(Color::parse),
                line: border_color
                    .as_deref()
                    .and_then(Color::parse)
                    .filter(|_| border_width > 0.0)
                    .map(|color| Stroke {
                        color,
                        width_pt: border_width * PT_PER_PX,
                    }),
            }),
        };
        spec.elements.push(converted);
    }

    spec.placeholders = extracted
        .placeholders
        .into_iter()
        .map(|p| Placeholder {
            id: p.id,
            frame: p.rect.to_frame(),
        })
        .collect();

    debug!(
        "Extracted {} elements and {} placeholders",
        spec.elements.len(),
        spec.placeholders.len()
    );
    Ok(spec)
}

fn build_paragraph(paragraph: ExtractedParagraph) -> Paragraph {
    let bullet = match paragraph.list.as_deref() {
        Some("ol") => Some(Bullet::Numbered),
        Some(_) => Some(Bullet::Disc),
        None => None,
    };
    Paragraph {
        runs: paragraph
            .runs
            .into_iter()
            .map(|run| TextRun {
                text: run.text,
                style: RunStyle {
                    font_face: first_family(&run.font_family),
                    size_pt: run.font_size * PT_PER_PX,
                    bold: run.bold,
                    italic: run.italic,
                    underline: run.underline,
                    color: Color::parse(&run.color),
                },
            })
            .collect(),
        align: Align::from_css(&paragraph.align).unwrap_or_default(),
        bullet,
        line_spacing_pt: paragraph.line_height.map(|px| px * PT_PER_PX),
    }
}

fn first_family(value: &str) -> Option<String> {
    value
        .split(',')
        .next()
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|f| !f.is_empty())
}

/// Measures the rendered page and returns it as a JSON string.
const EXTRACT_SCRIPT: &str = r#"
(() => {
    const errors = [];
    const body = document.body;
    const bodyStyle = getComputedStyle(body);
    const bodyRect = body.getBoundingClientRect();
    const textTags = ['P', 'H1', 'H2', 'H3', 'H4', 'H5', 'H6'];
    const inlineTags = ['SPAN', 'B', 'STRONG', 'I', 'EM', 'U', 'A', 'CODE', 'SMALL', 'MARK', 'S', 'BR'];

    const rect = (el) => {
        const r = el.getBoundingClientRect();
        return { x: r.left, y: r.top, w: r.width, h: r.height };
    };
    const visible = (color) => color && color !== 'transparent' && !/rgba\([^)]*,\s*0\)$/.test(color);
    const urlOf = (value) => {
        const m = /url\(["']?([^"')]+)["']?\)/.exec(value || '');
        return m ? m[1] : null;
    };
    const preview = (text) => text.trim().replace(/\s+/g, ' ').slice(0, 50);

    const runsOf = (el) => {
        const runs = [];
        const walk = (node) => {
            if (node.nodeType === Node.TEXT_NODE) {
                const text = node.textContent.replace(/\s+/g, ' ');
                if (!text) return;
                const s = getComputedStyle(node.parentElement);
                runs.push({
                    text,
                    fontSize: parseFloat(s.fontSize),
                    fontFamily: s.fontFamily,
                    bold: parseInt(s.fontWeight, 10) >= 600 || s.fontWeight === 'bold',
                    italic: s.fontStyle === 'italic',
                    underline: s.textDecorationLine.includes('underline'),
                    color: s.color,
                });
            } else if (node.nodeType === Node.ELEMENT_NODE) {
                if (node.tagName === 'BR') {
                    const s = getComputedStyle(node.parentElement);
                    runs.push({
                        text: '\n', fontSize: parseFloat(s.fontSize), fontFamily: s.fontFamily,
                        bold: false, italic: false, underline: false, color: s.color,
                    });
                    return;
                }
                if (node.tagName === 'UL' || node.tagName === 'OL') return;
                node.childNodes.forEach(walk);
            }
        };
        el.childNodes.forEach(walk);
        if (runs.length) {
            runs[0].text = runs[0].text.replace(/^\s+/, '');
            runs[runs.length - 1].text = runs[runs.length - 1].text.replace(/\s+$/, '');
        }
        return runs.filter((r) => r.text.length > 0);
    };

    const paragraphOf = (el, list) => {
        const s = getComputedStyle(el);
        const lineHeight = s.lineHeight === 'normal' ? null : parseFloat(s.lineHeight);
        return { runs: runsOf(el), align: s.textAlign, list, lineHeight };
    };

    const result = {
        width: bodyRect.width,
        height: bodyRect.height,
        scrollWidth: Math.max(body.scrollWidth, document.documentElement.scrollWidth),
        scrollHeight: Math.max(body.scrollHeight, document.documentElement.scrollHeight),
        background: null,
        elements: [],
        placeholders: [],
        errors,
    };

    const bgImage = urlOf(bodyStyle.backgroundImage);
    if (bodyStyle.backgroundImage.includes('gradient(')) {
        errors.push('CSS gradients are not supported on <body>; use a background image');
    } else if (bgImage) {
        result.background = { kind: 'image', src: bgImage };
    } else if (visible(bodyStyle.backgroundColor)) {
        result.background = { kind: 'color', color: bodyStyle.backgroundColor };
    }

    const handled = new Set();
    for (const el of body.querySelectorAll('*')) {
        if (handled.has(el)) continue;
        const s = getComputedStyle(el);
        if (s.display === 'none' || s.visibility === 'hidden') continue;
        const tag = el.tagName;

        if (el.classList.contains('placeholder')) {
            result.placeholders.push({ id: el.id || `placeholder-${result.placeholders.length + 1}`, rect: rect(el) });
            el.querySelectorAll('*').forEach((child) => handled.add(child));
            continue;
        }

        if (tag === 'IMG') {
            result.elements.push({ kind: 'image', rect: rect(el), src: el.src, alt: el.alt || '' });
            continue;
        }

        if (s.backgroundImage.includes('gradient(')) {
            errors.push(`CSS gradients are not supported on <${tag.toLowerCase()}>; use a background image`);
        }

        if (textTags.includes(tag)) {
            if (visible(s.backgroundColor) || parseFloat(s.borderTopWidth) > 0) {
                errors.push(`Text element <${tag.toLowerCase()}> has a background or border; move it to a wrapping <div>`);
            }
            const paragraph = paragraphOf(el, null);
            if (paragraph.runs.length) {
                result.elements.push({ kind: 'text', rect: rect(el), paragraphs: [paragraph] });
            }
            el.querySelectorAll('*').forEach((child) => handled.add(child));
            continue;
        }

        if (tag === 'UL' || tag === 'OL') {
            const paragraphs = [];
            el.querySelectorAll('li').forEach((li) => {
                const listTag = li.parentElement.tagName === 'OL' ? 'ol' : 'ul';
                const marker = getComputedStyle(li).listStyleType === 'none' ? null : listTag;
                const paragraph = paragraphOf(li, marker);
                if (paragraph.runs.length) paragraphs.push(paragraph);
            });
            if (paragraphs.length) {
                result.elements.push({ kind: 'text', rect: rect(el), paragraphs });
            }
            el.querySelectorAll('*').forEach((child) => handled.add(child));
            continue;
        }

        if (tag === 'DIV' || tag === 'SECTION' || tag === 'HEADER' || tag === 'FOOTER' || tag === 'MAIN' || tag === 'ARTICLE') {
            for (const node of el.childNodes) {
                if (node.nodeType === Node.TEXT_NODE && node.textContent.trim()) {
                    errors.push(`<${tag.toLowerCase()}> contains text outside a <p>, heading or list; wrap it: "${preview(node.textContent)}"`);
                }
            }
            const border = parseFloat(s.borderTopWidth) || 0;
            if (visible(s.backgroundColor) || border > 0) {
                result.elements.push({
                    kind: 'shape',
                    rect: rect(el),
                    fill: visible(s.backgroundColor) ? s.backgroundColor : null,
                    borderColor: border > 0 ? s.borderTopColor : null,
                    borderWidth: border,
                    radius: parseFloat(s.borderTopLeftRadius) || 0,
                });
            }
            continue;
        }

        if (inlineTags.includes(tag) && el.parentElement && !textTags.includes(el.parentElement.tagName)
            && el.parentElement.closest('p,h1,h2,h3,h4,h5,h6,li') === null && el.textContent.trim()) {
            errors.push(`<${tag.toLowerCase()}> contains text outside a <p>, heading or list; wrap it: "${preview(el.textContent)}"`);
            el.querySelectorAll('*').forEach((child) => handled.add(child));
        }
    }

    return JSON.stringify(result);
})()
"#;
