// ABOUTME: Browserless HTML-to-slide converter for the deckling application
// ABOUTME: Tokenizes slide HTML and lays out block elements in a simple top-down flow

use crate::convert::{self, SlideConverter};
use crate::css::{Declarations, Length, Stylesheet};
use crate::errors::ConvertError;
use crate::layout::{LayoutPreset, PX_PER_INCH};
use crate::resources::ImageSource;
use crate::slide::{
    Align, Background, Bullet, Color, Frame, Geometry, Paragraph, Picture, Placeholder, RunStyle,
    ShapeBox, SlideElement, SlideSpec, Stroke, TextBox, TextRun,
};
use log::{debug, info, warn};
use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::Path;

const VOID_TAGS: [&str; 8] = ["br", "img", "meta", "link", "hr", "input", "source", "wbr"];
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "template", "noscript", "head", "title"];
const INLINE_TAGS: [&str; 14] = [
    "span", "b", "strong", "i", "em", "u", "a", "code", "small", "sup", "sub", "mark", "s", "label",
];

/// Layout settings for the markup converter.
#[derive(Debug, Clone)]
pub struct MarkupOptions {
    /// Slide padding used when `body` declares none, in inches.
    pub margin_in: f64,
    /// Font used when no `font-family` applies.
    pub default_font: String,
    /// Vertical space after each block, in inches.
    pub block_gap_in: f64,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            margin_in: 0.5,
            default_font: "Arial".to_string(),
            block_gap_in: 0.12,
        }
    }
}

/// Converts slides without a browser by approximating CSS flow layout.
#[derive(Debug, Clone, Default)]
pub struct MarkupConverter {
    options: MarkupOptions,
}

impl MarkupConverter {
    pub fn new(options: MarkupOptions) -> Self {
        Self { options }
    }
}

impl SlideConverter for MarkupConverter {
    fn convert(&mut self, source: &Path, layout: LayoutPreset) -> Result<SlideSpec, ConvertError> {
        info!("Converting slide markup: {:?}", source);
        let html = fs::read_to_string(source)?;
        let base_dir = source.parent().unwrap_or_else(|| Path::new("."));
        convert_markup(&html, base_dir, layout, &self.options)
    }
}

/// Convert an HTML document to a slide description.
///
/// `base_dir` resolves relative image references.
pub fn convert_markup(
    html: &str,
    base_dir: &Path,
    layout: LayoutPreset,
    options: &MarkupOptions,
) -> Result<SlideSpec, ConvertError> {
    let document = parse_document(html)?;

    let mut sheet = Stylesheet::default();
    let mut style_blocks = Vec::new();
    document.collect_by_tag("style", &mut style_blocks);
    for block in style_blocks {
        sheet.add(&block.text());
    }

    let body = document.find("body").unwrap_or(&document);
    let mut flow = Flow::new(&sheet, base_dir, layout, options);
    flow.run(body)?;
    flow.finish()
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn find(&self, tag: &str) -> Option<&Element> {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.tag == tag {
                    return Some(el);
                }
                if let Some(found) = el.find(tag) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn collect_by_tag<'a>(&'a self, tag: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.tag == tag {
                    out.push(el);
                }
                el.collect_by_tag(tag, out);
            }
        }
    }

    fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(el) => out.push_str(&el.text()),
            }
        }
        out
    }
}

/// Build an element tree, tolerating the usual HTML shortcuts.
fn parse_document(html: &str) -> Result<Element, ConvertError> {
    let mut reader = Reader::from_str(html);
    reader.check_end_names(false);

    let mut stack = vec![Element::new("#document")];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let el = start_element(&e);
                close_implied(&mut stack, &el.tag);
                if VOID_TAGS.contains(&el.tag.as_str()) {
                    append(&mut stack, Node::Element(el));
                } else {
                    stack.push(el);
                }
            }
            Ok(Event::Empty(e)) => {
                let el = start_element(&e);
                close_implied(&mut stack, &el.tag);
                append(&mut stack, Node::Element(el));
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                if let Some(pos) = stack.iter().rposition(|el| el.tag == tag) {
                    if pos > 0 {
                        while stack.len() > pos {
                            pop(&mut stack);
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let raw = String::from_utf8_lossy(&t).into_owned();
                let text = match unescape_with(&raw, html_entity) {
                    Ok(text) => text.into_owned(),
                    Err(e) => {
                        debug!("Keeping undecodable text as-is: {}", e);
                        raw
                    }
                };
                append(&mut stack, Node::Text(text));
            }
            Ok(Event::CData(t)) => {
                append(&mut stack, Node::Text(String::from_utf8_lossy(&t).into_owned()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ConvertError::Parse(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    while stack.len() > 1 {
        pop(&mut stack);
    }
    stack
        .pop()
        .ok_or_else(|| ConvertError::Parse("empty document".to_string()))
}

fn start_element(e: &BytesStart<'_>) -> Element {
    let mut el = Element::new(String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase());
    for attr in e.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        let value = unescape_with(&raw, html_entity)
            .map(|v| v.into_owned())
            .unwrap_or(raw);
        el.attrs.push((key, value));
    }
    el
}

/// Close elements HTML closes implicitly when `tag` opens.
fn close_implied(stack: &mut Vec<Element>, tag: &str) {
    let closes: &[&str] = match tag {
        "li" => &["li", "p"],
        "p" | "ul" | "ol" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "table" => &["p"],
        _ => &[],
    };
    while stack.len() > 1
        && stack
            .last()
            .map_or(false, |top| closes.contains(&top.tag.as_str()))
    {
        pop(stack);
    }
}

fn append(stack: &mut [Element], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn pop(stack: &mut Vec<Element>) {
    if let Some(el) = stack.pop() {
        append(stack, Node::Element(el));
    }
}

/// Named HTML entities beyond the XML set.
fn html_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "times" => "\u{d7}",
        "deg" => "\u{b0}",
        "euro" => "\u{20ac}",
        "rarr" => "\u{2192}",
        "larr" => "\u{2190}",
        "check" => "\u{2713}",
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LineHeight {
    Multiple(f64),
    Fixed(f64),
}

/// Inherited text properties.
#[derive(Debug, Clone)]
struct TextStyle {
    run: RunStyle,
    align: Align,
    line_height: Option<LineHeight>,
}

/// Horizontal band available to flowed content.
#[derive(Debug, Clone, Copy)]
struct Region {
    x: f64,
    w: f64,
}

/// An absolutely positioned box; missing sizes come from content.
#[derive(Debug, Clone, Copy)]
struct Positioned {
    x: f64,
    y: f64,
    w: Option<f64>,
    h: Option<f64>,
}

struct Flow<'a> {
    sheet: &'a Stylesheet,
    base_dir: &'a Path,
    layout: LayoutPreset,
    options: &'a MarkupOptions,
    slide_w: f64,
    slide_h: f64,
    margin: f64,
    cursor_y: f64,
    needed_right: f64,
    needed_bottom: f64,
    spec: SlideSpec,
    problems: Vec<String>,
}

impl<'a> Flow<'a> {
    fn new(
        sheet: &'a Stylesheet,
        base_dir: &'a Path,
        layout: LayoutPreset,
        options: &'a MarkupOptions,
    ) -> Self {
        let (slide_w, slide_h) = layout.size_inches();
        Self {
            sheet,
            base_dir,
            layout,
            options,
            slide_w,
            slide_h,
            margin: options.margin_in,
            cursor_y: options.margin_in,
            needed_right: 0.0,
            needed_bottom: 0.0,
            spec: SlideSpec::default(),
            problems: Vec::new(),
        }
    }

    fn run(&mut self, body: &Element) -> Result<(), ConvertError> {
        let base = TextStyle {
            run: RunStyle {
                font_face: Some(self.options.default_font.clone()),
                ..RunStyle::default()
            },
            align: Align::Left,
            line_height: None,
        };
        let (decls, style) = self.compute(body, &base);

        let font_pt = style.run.size_pt;
        let declared_w = length_in(&decls, "width", font_pt, self.slide_w);
        let declared_h = length_in(&decls, "height", font_pt, self.slide_h);
        if declared_w.is_some() || declared_h.is_some() {
            convert::check_dimensions(
                self.layout,
                declared_w.unwrap_or(self.slide_w),
                declared_h.unwrap_or(self.slide_h),
            )?;
        }

        if let Some(target) = decls.background_image() {
            let image = ImageSource::resolve(&target, self.base_dir)?.load()?;
            self.spec.background = Some(Background::Image(image));
        } else if let Some(color) = decls.background_color().and_then(Color::parse) {
            self.spec.background = Some(Background::Color(color));
        }
        if decls.has_gradient() {
            self.problems
                .push("CSS gradients are not supported on <body>; use a background image".to_string());
        }

        if let Some(padding) = length_in(&decls, "padding", font_pt, self.slide_w) {
            self.margin = padding;
        }
        self.cursor_y = self.margin;
        let region = Region {
            x: self.margin,
            w: (self.slide_w - 2.0 * self.margin).max(0.0),
        };
        self.contents(body, &decls, &style, region)
    }

    fn finish(self) -> Result<SlideSpec, ConvertError> {
        if !self.problems.is_empty() {
            return Err(ConvertError::Validation(self.problems));
        }
        convert::check_overflow(self.layout, self.needed_right, self.needed_bottom)?;
        debug!(
            "Laid out {} elements and {} placeholders",
            self.spec.elements.len(),
            self.spec.placeholders.len()
        );
        Ok(self.spec)
    }

    /// Cascaded declarations plus the inherited text style for `el`.
    fn compute(&self, el: &Element, parent: &TextStyle) -> (Declarations, TextStyle) {
        let mut decls = self.sheet.declarations_for(&el.tag, &el.classes());
        if let Some(inline) = el.attr("style") {
            decls.merge(&Declarations::parse(inline));
        }

        let mut style = parent.clone();
        match el.tag.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                style.run.size_pt = heading_size(&el.tag);
                style.run.bold = true;
            }
            "b" | "strong" => style.run.bold = true,
            "i" | "em" => style.run.italic = true,
            "u" => style.run.underline = true,
            _ => {}
        }

        if let Some(size) = decls.get("font-size").and_then(Length::parse) {
            style.run.size_pt = size.to_pt(parent.run.size_pt);
        }
        if let Some(color) = decls.get("color") {
            match Color::parse(color) {
                Some(c) => style.run.color = Some(c),
                None => warn!("Unsupported color value {:?}", color),
            }
        }
        if let Some(family) = decls.get("font-family") {
            style.run.font_face = Some(first_font_family(family));
        }
        if let Some(weight) = decls.get("font-weight") {
            style.run.bold = match weight {
                "bold" | "bolder" => true,
                "normal" | "lighter" => false,
                other => other.parse::<u32>().map(|w| w >= 600).unwrap_or(style.run.bold),
            };
        }
        if let Some(font_style) = decls.get("font-style") {
            style.run.italic = font_style == "italic" || font_style == "oblique";
        }
        if let Some(decoration) = decls
            .get("text-decoration")
            .or_else(|| decls.get("text-decoration-line"))
        {
            style.run.underline = decoration.contains("underline");
        }
        if let Some(align) = decls.get("text-align").and_then(Align::from_css) {
            style.align = align;
        }
        if let Some(value) = decls.get("line-height") {
            style.line_height = if value == "normal" {
                None
            } else if let Ok(multiple) = value.parse::<f64>() {
                Some(LineHeight::Multiple(multiple))
            } else {
                Length::parse(value).map(|l| LineHeight::Fixed(l.to_pt(style.run.size_pt)))
            };
        }
        (decls, style)
    }

    fn contents(
        &mut self,
        el: &Element,
        decls: &Declarations,
        style: &TextStyle,
        region: Region,
    ) -> Result<(), ConvertError> {
        let is_row = decls.get("display").map_or(false, |d| d.contains("flex"))
            && decls
                .get("flex-direction")
                .map_or(true, |d| d.starts_with("row"));
        if is_row {
            self.row(el, decls, style, region)
        } else {
            self.column(el, style, region)
        }
    }

    fn column(&mut self, el: &Element, style: &TextStyle, region: Region) -> Result<(), ConvertError> {
        for child in &el.children {
            match child {
                Node::Text(text) => self.stray_text(&el.tag, text),
                Node::Element(child) => self.block(child, style, region)?,
            }
        }
        Ok(())
    }

    /// Lay element children side by side, sharing the width.
    fn row(
        &mut self,
        el: &Element,
        decls: &Declarations,
        style: &TextStyle,
        region: Region,
    ) -> Result<(), ConvertError> {
        let mut kids = Vec::new();
        for child in &el.children {
            match child {
                Node::Text(text) => self.stray_text(&el.tag, text),
                Node::Element(child) if !SKIPPED_TAGS.contains(&child.tag.as_str()) => {
                    kids.push(child)
                }
                Node::Element(_) => {}
            }
        }
        if kids.is_empty() {
            return Ok(());
        }

        let font_pt = style.run.size_pt;
        let gap = decls
            .get("gap")
            .or_else(|| decls.get("column-gap"))
            .and_then(Length::parse)
            .map_or(0.2, |l| l.to_inches(font_pt, region.w));
        let available = (region.w - gap * (kids.len() - 1) as f64).max(0.0);

        let explicit: Vec<Option<f64>> = kids
            .iter()
            .map(|kid| {
                let (kid_decls, _) = self.compute(kid, style);
                length_in(&kid_decls, "width", font_pt, region.w)
                    .or_else(|| {
                        kid_decls
                            .get("flex")
                            .and_then(|f| f.split_whitespace().next())
                            .and_then(|f| f.parse::<f64>().ok())
                            .map(|grow| -grow)
                    })
            })
            .collect();
        // negative entries are flex-grow weights sharing the remainder
        let fixed: f64 = explicit.iter().flatten().filter(|w| **w > 0.0).sum();
        let weights: f64 = explicit
            .iter()
            .map(|w| match w {
                Some(w) if *w > 0.0 => 0.0,
                Some(w) => -*w,
                None => 1.0,
            })
            .sum();
        let remainder = (available - fixed).max(0.0);

        let start = self.cursor_y;
        let mut bottom = start;
        let mut x = region.x;
        for (kid, width) in kids.into_iter().zip(explicit) {
            let w = match width {
                Some(w) if w > 0.0 => w,
                Some(w) if weights > 0.0 => remainder * -w / weights,
                None if weights > 0.0 => remainder / weights,
                _ => 0.0,
            };
            self.cursor_y = start;
            self.block(kid, style, Region { x, w })?;
            bottom = bottom.max(self.cursor_y);
            x += w + gap;
        }
        self.cursor_y = bottom;
        Ok(())
    }

    fn stray_text(&mut self, parent_tag: &str, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() && !SKIPPED_TAGS.contains(&parent_tag) {
            let preview: String = trimmed.chars().take(50).collect();
            self.problems.push(format!(
                "<{}> contains text outside a <p>, heading or list; wrap it: {:?}",
                parent_tag, preview
            ));
        }
    }

    fn block(&mut self, el: &Element, parent: &TextStyle, region: Region) -> Result<(), ConvertError> {
        match el.tag.as_str() {
            tag if SKIPPED_TAGS.contains(&tag) => Ok(()),
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" => {
                self.text_block(el, parent, region);
                Ok(())
            }
            "ul" | "ol" => {
                self.list(el, parent, region);
                Ok(())
            }
            "img" => self.picture(el, parent, region),
            "br" | "hr" => Ok(()),
            "table" => {
                warn!("Tables are not laid out by the markup converter; skipping");
                Ok(())
            }
            tag if INLINE_TAGS.contains(&tag) => {
                let text = el.text();
                self.stray_text(tag, &text);
                Ok(())
            }
            _ => self.container(el, parent, region),
        }
    }

    fn container(&mut self, el: &Element, parent: &TextStyle, region: Region) -> Result<(), ConvertError> {
        let (decls, style) = self.compute(el, parent);
        let font_pt = style.run.size_pt;

        if decls.has_gradient() {
            self.problems.push(format!(
                "CSS gradients are not supported on <{}>; use a background image",
                el.tag
            ));
        }

        let positioned = self.positioned(&decls, font_pt);
        let width = positioned
            .and_then(|p| p.w)
            .or_else(|| length_in(&decls, "width", font_pt, region.w))
            .unwrap_or(region.w);
        let height = positioned
            .and_then(|p| p.h)
            .or_else(|| length_in(&decls, "height", font_pt, self.slide_h));
        let margin_top = margin_in(&decls, "top", font_pt, region.w).unwrap_or(0.0);
        let x = positioned.map_or(region.x, |p| p.x);
        let top = positioned.map_or(self.cursor_y + margin_top, |p| p.y);

        if el.classes().iter().any(|c| c == "placeholder") {
            let frame = Frame::new(x, top, width, height.unwrap_or(1.0));
            let id = el
                .attr("id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("placeholder-{}", self.spec.placeholders.len() + 1));
            debug!("Placeholder {} at {:?}", id, frame);
            self.spec.placeholders.push(Placeholder { id, frame });
            self.record(frame, positioned.is_none());
            if positioned.is_none() {
                self.cursor_y = frame.bottom() + self.gap_after(&decls, font_pt);
            }
            return Ok(());
        }

        let fill = decls.background_color().and_then(Color::parse);
        let line = decls.border().and_then(|(color, width_pt)| {
            Color::parse(&color).map(|color| Stroke { color, width_pt })
        });
        let boxed = fill.is_some() || line.is_some();
        if !boxed && positioned.is_none() && decls.get("width").is_none() {
            return self.contents(el, &decls, &style, region);
        }

        let padding = length_in(&decls, "padding", font_pt, width).unwrap_or(if boxed { 0.1 } else { 0.0 });
        let shape_index = boxed.then(|| {
            let geometry = if decls.get("border-radius").and_then(Length::parse).map_or(false, |r| r.to_pt(font_pt) > 0.0) {
                Geometry::RoundRect
            } else {
                Geometry::Rect
            };
            self.spec.elements.push(SlideElement::Shape(ShapeBox {
                frame: Frame::new(x, top, width, height.unwrap_or(0.0)),
                geometry,
                fill: fill.clone(),
                line: line.clone(),
            }));
            self.spec.elements.len() - 1
        });

        let resume_y = self.cursor_y;
        self.cursor_y = top + padding;
        let inner = Region {
            x: x + padding,
            w: (width - 2.0 * padding).max(0.0),
        };
        self.contents(el, &decls, &style, inner)?;

        let content_h = (self.cursor_y - top - self.options.block_gap_in + padding).max(2.0 * padding);
        let frame = Frame::new(x, top, width, height.unwrap_or(content_h));
        if let Some(index) = shape_index {
            if let SlideElement::Shape(shape) = &mut self.spec.elements[index] {
                shape.frame = frame;
            }
        }
        self.record(frame, positioned.is_none());
        self.cursor_y = if positioned.is_some() {
            resume_y
        } else {
            frame.bottom() + self.gap_after(&decls, font_pt)
        };
        Ok(())
    }

    fn text_block(&mut self, el: &Element, parent: &TextStyle, region: Region) {
        let (decls, style) = self.compute(el, parent);
        if decls.background_color().and_then(Color::parse).is_some() || decls.border().is_some() {
            self.problems.push(format!(
                "Text element <{}> has a background or border; move it to a wrapping <div>",
                el.tag
            ));
        }

        let mut runs = Vec::new();
        self.collect_runs(el, &style, &mut runs);
        let runs = normalize_runs(runs, el.tag == "pre");
        if runs.is_empty() {
            return;
        }
        let paragraph = Paragraph {
            line_spacing_pt: line_spacing(&style),
            runs,
            align: style.align,
            bullet: None,
        };
        self.place_text(vec![paragraph], &decls, &style, region);
    }

    fn list(&mut self, el: &Element, parent: &TextStyle, region: Region) {
        let (decls, style) = self.compute(el, parent);
        let mut paragraphs = Vec::new();
        self.list_items(el, &decls, &style, &mut paragraphs);
        if !paragraphs.is_empty() {
            self.place_text(paragraphs, &decls, &style, region);
        }
    }

    fn list_items(
        &mut self,
        list: &Element,
        decls: &Declarations,
        style: &TextStyle,
        out: &mut Vec<Paragraph>,
    ) {
        let bullet = match decls.get("list-style-type").or_else(|| decls.get("list-style")) {
            Some("none") => None,
            _ if list.tag == "ol" => Some(Bullet::Numbered),
            _ => Some(Bullet::Disc),
        };
        for child in &list.children {
            let item = match child {
                Node::Element(item) if item.tag == "li" => item,
                Node::Element(_) => continue,
                Node::Text(text) => {
                    self.stray_text(&list.tag, text);
                    continue;
                }
            };
            let (_, item_style) = self.compute(item, style);
            let mut runs = Vec::new();
            let mut nested = Vec::new();
            for node in &item.children {
                match node {
                    Node::Element(sub) if sub.tag == "ul" || sub.tag == "ol" => nested.push(sub),
                    other => self.collect_node(other, &item_style, &mut runs),
                }
            }
            let runs = normalize_runs(runs, false);
            let text: String = runs.iter().map(|r| r.text.as_str()).collect();
            if let Some(problem) = convert::manual_bullet_problem(&text) {
                self.problems.push(problem);
            }
            if !runs.is_empty() {
                out.push(Paragraph {
                    line_spacing_pt: line_spacing(&item_style),
                    runs,
                    align: item_style.align,
                    bullet,
                });
            }
            for sub in nested {
                let (sub_decls, sub_style) = self.compute(sub, &item_style);
                self.list_items(sub, &sub_decls, &sub_style, out);
            }
        }
    }

    fn collect_runs(&self, el: &Element, style: &TextStyle, out: &mut Vec<TextRun>) {
        for node in &el.children {
            self.collect_node(node, style, out);
        }
    }

    fn collect_node(&self, node: &Node, style: &TextStyle, out: &mut Vec<TextRun>) {
        match node {
            Node::Text(text) => out.push(TextRun {
                text: text.clone(),
                style: style.run.clone(),
            }),
            Node::Element(el) if el.tag == "br" => out.push(TextRun {
                text: "\n".to_string(),
                style: style.run.clone(),
            }),
            Node::Element(el) if el.tag == "img" || SKIPPED_TAGS.contains(&el.tag.as_str()) => {
                debug!("Ignoring <{}> inside text", el.tag);
            }
            Node::Element(el) => {
                let (_, child_style) = self.compute(el, style);
                self.collect_runs(el, &child_style, out);
            }
        }
    }

    fn place_text(
        &mut self,
        paragraphs: Vec<Paragraph>,
        decls: &Declarations,
        style: &TextStyle,
        region: Region,
    ) {
        let font_pt = style.run.size_pt;
        let positioned = self.positioned(decls, font_pt);
        let margin_top = margin_in(decls, "top", font_pt, region.w).unwrap_or(0.0);
        let width = positioned
            .and_then(|p| p.w)
            .or_else(|| length_in(decls, "width", font_pt, region.w))
            .unwrap_or(region.w);
        let height = positioned
            .and_then(|p| p.h)
            .or_else(|| length_in(decls, "height", font_pt, self.slide_h))
            .unwrap_or_else(|| estimate_height(&paragraphs, width));
        let frame = match positioned {
            Some(p) => Frame::new(p.x, p.y, width, height),
            None => Frame::new(region.x, self.cursor_y + margin_top, width, height),
        };

        self.spec.elements.push(SlideElement::Text(TextBox { frame, paragraphs }));
        self.record(frame, positioned.is_none());
        if positioned.is_none() {
            self.cursor_y = frame.bottom() + self.gap_after(decls, font_pt);
        }
    }

    fn picture(&mut self, el: &Element, parent: &TextStyle, region: Region) -> Result<(), ConvertError> {
        let (decls, style) = self.compute(el, parent);
        let Some(src) = el.attr("src") else {
            self.problems.push("<img> without a src attribute".to_string());
            return Ok(());
        };
        let image = ImageSource::resolve(src, self.base_dir)?.load()?;
        let font_pt = style.run.size_pt;

        let attr_in = |name: &str| {
            el.attr(name)
                .and_then(|v| v.trim_end_matches("px").parse::<f64>().ok())
                .map(|px| px / PX_PER_INCH)
        };
        let mut w = length_in(&decls, "width", font_pt, region.w).or_else(|| attr_in("width"));
        let mut h = length_in(&decls, "height", font_pt, self.slide_h).or_else(|| attr_in("height"));
        let aspect = if image.width_px > 0 {
            image.height_px as f64 / image.width_px as f64
        } else {
            1.0
        };
        match (w, h) {
            (Some(_), Some(_)) => {}
            (Some(width), None) => h = Some(width * aspect),
            (None, Some(height)) => w = Some(height / aspect),
            (None, None) => {
                w = Some(image.width_px as f64 / PX_PER_INCH);
                h = Some(image.height_px as f64 / PX_PER_INCH);
            }
        }
        let (mut w, mut h) = (w.unwrap_or(0.0), h.unwrap_or(0.0));

        let positioned = self.positioned(&decls, font_pt);
        if positioned.is_none() && w > region.w && w > 0.0 {
            let scale = region.w / w;
            w *= scale;
            h *= scale;
        }
        let frame = match positioned {
            Some(p) => Frame::new(p.x, p.y, p.w.unwrap_or(w), p.h.unwrap_or(h)),
            None => Frame::new(region.x, self.cursor_y, w, h),
        };
        self.spec.elements.push(SlideElement::Picture(Picture {
            frame,
            image,
            description: el.attr("alt").unwrap_or_default().to_string(),
        }));
        self.record(frame, positioned.is_none());
        if positioned.is_none() {
            self.cursor_y = frame.bottom() + self.gap_after(&decls, font_pt);
        }
        Ok(())
    }

    fn positioned(&self, decls: &Declarations, font_pt: f64) -> Option<Positioned> {
        let position = decls.get("position")?;
        if position != "absolute" && position != "fixed" {
            return None;
        }
        let left = length_in(decls, "left", font_pt, self.slide_w);
        let top = length_in(decls, "top", font_pt, self.slide_h);
        if left.is_none() && top.is_none() {
            return None;
        }
        Some(Positioned {
            x: left.unwrap_or(0.0),
            y: top.unwrap_or(0.0),
            w: length_in(decls, "width", font_pt, self.slide_w),
            h: length_in(decls, "height", font_pt, self.slide_h),
        })
    }

    fn gap_after(&self, decls: &Declarations, font_pt: f64) -> f64 {
        margin_in(decls, "bottom", font_pt, self.slide_w).unwrap_or(self.options.block_gap_in)
    }

    /// Track how far content reaches; flowed content also needs the margin.
    fn record(&mut self, frame: Frame, flowed: bool) {
        let pad = if flowed { self.margin } else { 0.0 };
        self.needed_right = self.needed_right.max(frame.right() + pad);
        self.needed_bottom = self.needed_bottom.max(frame.bottom() + pad);
    }
}

fn heading_size(tag: &str) -> f64 {
    match tag {
        "h1" => 32.0,
        "h2" => 26.0,
        "h3" => 22.0,
        "h4" => 18.0,
        "h5" => 16.0,
        _ => 14.0,
    }
}

fn first_font_family(value: &str) -> String {
    let first = value
        .split(',')
        .next()
        .unwrap_or(value)
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    match first {
        "sans-serif" | "system-ui" | "" => "Arial".to_string(),
        "serif" => "Times New Roman".to_string(),
        "monospace" => "Courier New".to_string(),
        other => other.to_string(),
    }
}

fn length_in(decls: &Declarations, name: &str, font_pt: f64, reference_in: f64) -> Option<f64> {
    let value = decls.get(name)?;
    // shorthand like `padding: 20px 40px` uses its first value
    let first = value.split_whitespace().next()?;
    Length::parse(first).map(|l| l.to_inches(font_pt, reference_in))
}

/// Top or bottom margin from the longhand, else from the `margin` shorthand.
fn margin_in(decls: &Declarations, side: &str, font_pt: f64, reference_in: f64) -> Option<f64> {
    if let Some(longhand) = length_in(decls, &format!("margin-{}", side), font_pt, reference_in) {
        return Some(longhand);
    }
    let values: Vec<&str> = decls.get("margin")?.split_whitespace().collect();
    // one or two values share top and bottom; three or four list bottom third
    let value = match values.len() {
        3 | 4 if side == "bottom" => values[2],
        _ => *values.first()?,
    };
    Length::parse(value).map(|l| l.to_inches(font_pt, reference_in))
}

fn line_spacing(style: &TextStyle) -> Option<f64> {
    style.line_height.map(|lh| match lh {
        LineHeight::Multiple(m) => m * style.run.size_pt,
        LineHeight::Fixed(pt) => pt,
    })
}

/// Collapse whitespace the way HTML renders it and merge equal-style runs.
fn normalize_runs(runs: Vec<TextRun>, preformatted: bool) -> Vec<TextRun> {
    let mut out: Vec<TextRun> = Vec::new();
    let mut at_line_start = true;
    for run in runs {
        let text = if preformatted || run.text == "\n" {
            run.text
        } else {
            let mut collapsed = String::with_capacity(run.text.len());
            let mut last_space =
                at_line_start || out.last().map_or(false, |r| r.text.ends_with(' '));
            for c in run.text.chars() {
                if c.is_whitespace() && c != '\u{a0}' {
                    if !last_space {
                        collapsed.push(' ');
                        last_space = true;
                    }
                } else {
                    collapsed.push(c);
                    last_space = false;
                }
            }
            collapsed
        };
        if text.is_empty() {
            continue;
        }
        if text == "\n" {
            if let Some(last) = out.last_mut() {
                let trimmed = last.text.trim_end_matches(' ').len();
                last.text.truncate(trimmed);
            }
        }
        at_line_start = text.ends_with('\n') || (at_line_start && text.trim().is_empty());
        let merge = text != "\n"
            && out
                .last()
                .map_or(false, |last| last.style == run.style && !last.text.ends_with('\n'));
        if merge {
            if let Some(last) = out.last_mut() {
                last.text.push_str(&text);
            }
        } else {
            out.push(TextRun {
                text,
                style: run.style,
            });
        }
    }
    if let Some(last) = out.last_mut() {
        let trimmed = last.text.trim_end_matches(' ').len();
        last.text.truncate(trimmed);
    }
    out.retain(|r| !r.text.is_empty());
    while out.last().map_or(false, |r| r.text == "\n") {
        out.pop();
    }
    out
}

/// Approximate rendered height from character counts, in inches.
fn estimate_height(paragraphs: &[Paragraph], width_in: f64) -> f64 {
    let mut total_pt = 0.0;
    for paragraph in paragraphs {
        let size = paragraph
            .runs
            .iter()
            .map(|r| r.style.size_pt)
            .fold(0.0_f64, f64::max)
            .max(1.0);
        let bold = paragraph.runs.iter().any(|r| r.style.bold);
        let char_w = size * if bold { 0.55 } else { 0.5 };
        let indent_pt = if paragraph.bullet.is_some() { 0.3 * 72.0 } else { 0.0 };
        let available_pt = (width_in * 72.0 - indent_pt).max(char_w);
        let per_line = (available_pt / char_w).floor().max(1.0);

        let lines: f64 = paragraph
            .text()
            .split('\n')
            .map(|segment| (segment.chars().count() as f64 / per_line).ceil().max(1.0))
            .sum();
        let line_h = paragraph.line_spacing_pt.unwrap_or(size * 1.2);
        total_pt += lines * line_h;
    }
    total_pt / 72.0 + 0.05
}
