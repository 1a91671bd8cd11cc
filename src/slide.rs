// ABOUTME: Slide description model for the deckling application
// ABOUTME: Immutable slide values produced by converters and the presentation accumulator

use crate::layout::LayoutPreset;
use image::ImageFormat as DecodedFormat;
use std::io::Cursor;

/// A color as six uppercase hex digits (`RRGGBB`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Color(String);

impl Color {
    /// Build a color from red, green and blue components.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(format!("{:02X}{:02X}{:02X}", r, g, b))
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb()`/`rgba()` or a basic color keyword.
    ///
    /// Fully transparent colors and `transparent` yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if let Some(hex) = value.strip_prefix('#') {
            if !hex.is_ascii() {
                return None;
            }
            return match hex.len() {
                3 => {
                    let mut expanded = String::with_capacity(6);
                    for c in hex.chars() {
                        expanded.push(c);
                        expanded.push(c);
                    }
                    Self::from_hex(&expanded)
                }
                6 => Self::from_hex(hex),
                8 => {
                    if &hex[6..] == "00" {
                        None
                    } else {
                        Self::from_hex(&hex[..6])
                    }
                }
                _ => None,
            };
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
        {
            let args = args.trim_end_matches(')');
            let parts: Vec<&str> = args
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() < 3 {
                return None;
            }
            if let Some(alpha) = parts.get(3) {
                if alpha.parse::<f64>().map(|a| a <= 0.0).unwrap_or(false) {
                    return None;
                }
            }
            let channel = |s: &str| -> Option<u8> {
                s.parse::<f64>().ok().map(|v| v.round().clamp(0.0, 255.0) as u8)
            };
            return Some(Color::rgb(
                channel(parts[0])?,
                channel(parts[1])?,
                channel(parts[2])?,
            ));
        }
        let hex = match value.as_str() {
            "black" => "000000",
            "white" => "FFFFFF",
            "red" => "FF0000",
            "green" => "008000",
            "blue" => "0000FF",
            "yellow" => "FFFF00",
            "orange" => "FFA500",
            "purple" => "800080",
            "gray" | "grey" => "808080",
            "navy" => "000080",
            "teal" => "008080",
            _ => return None,
        };
        Some(Color(hex.to_string()))
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Color(hex.to_ascii_uppercase()))
        } else {
            None
        }
    }

    /// Hex digits without a leading `#`.
    pub fn hex(&self) -> &str {
        &self.0
    }
}

/// Position and size in inches, relative to the slide's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Frame {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim() {
            "left" | "start" => Some(Align::Left),
            "center" => Some(Align::Center),
            "right" | "end" => Some(Align::Right),
            "justify" => Some(Align::Justify),
            _ => None,
        }
    }
}

/// Character formatting of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStyle {
    pub font_face: Option<String>,
    pub size_pt: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Color>,
}

impl Default for RunStyle {
    fn default() -> Self {
        Self {
            font_face: None,
            size_pt: 16.0,
            bold: false,
            italic: false,
            underline: false,
            color: None,
        }
    }
}

/// A span of uniformly formatted text. A `\n` in `text` is a line break.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: RunStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bullet {
    Disc,
    Numbered,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
    pub align: Align,
    pub bullet: Option<Bullet>,
    /// Line spacing in points, when fixed.
    pub line_spacing_pt: Option<f64>,
}

impl Paragraph {
    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub frame: Frame,
    pub paragraphs: Vec<Paragraph>,
}

/// Supported embedded image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageKind {
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Gif => "gif",
            ImageKind::Bmp => "bmp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Bmp => "image/bmp",
        }
    }
}

/// Raw image bytes with their detected encoding and pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
    pub width_px: u32,
    pub height_px: u32,
}

impl ImageData {
    /// Detect the encoding and dimensions of an image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        let format = image::guess_format(&bytes).map_err(|e| e.to_string())?;
        let kind = match format {
            DecodedFormat::Png => ImageKind::Png,
            DecodedFormat::Jpeg => ImageKind::Jpeg,
            DecodedFormat::Gif => ImageKind::Gif,
            DecodedFormat::Bmp => ImageKind::Bmp,
            other => return Err(format!("unsupported image format {:?}", other)),
        };
        let (width_px, height_px) = image::io::Reader::with_format(Cursor::new(&bytes), format)
            .into_dimensions()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            bytes,
            kind,
            width_px,
            height_px,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub frame: Frame,
    pub image: ImageData,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width_pt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    Rect,
    RoundRect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeBox {
    pub frame: Frame,
    pub geometry: Geometry,
    pub fill: Option<Color>,
    pub line: Option<Stroke>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlideElement {
    Text(TextBox),
    Picture(Picture),
    Shape(ShapeBox),
}

impl SlideElement {
    pub fn frame(&self) -> Frame {
        match self {
            SlideElement::Text(t) => t.frame,
            SlideElement::Picture(p) => p.frame,
            SlideElement::Shape(s) => s.frame,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Color(Color),
    Image(ImageData),
}

/// A region reserved for content added after conversion, such as a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub id: String,
    pub frame: Frame,
}

/// Immutable description of one rendered slide.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlideSpec {
    pub background: Option<Background>,
    pub elements: Vec<SlideElement>,
    pub placeholders: Vec<Placeholder>,
}

impl SlideSpec {
    /// All text on the slide, one paragraph per line, in element order.
    pub fn text_content(&self) -> Vec<String> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                SlideElement::Text(t) => Some(t),
                _ => None,
            })
            .flat_map(|t| t.paragraphs.iter().map(Paragraph::text))
            .collect()
    }
}

/// Deck-wide metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckMetadata {
    pub layout: LayoutPreset,
    pub author: String,
    pub title: String,
}

impl Default for DeckMetadata {
    fn default() -> Self {
        Self {
            layout: LayoutPreset::default(),
            author: String::new(),
            title: "Presentation".to_string(),
        }
    }
}

/// The in-progress deck: metadata plus an append-only slide sequence.
#[derive(Debug, Clone, Default)]
pub struct Presentation {
    metadata: DeckMetadata,
    slides: Vec<SlideSpec>,
}

impl Presentation {
    pub fn new(metadata: DeckMetadata) -> Self {
        Self {
            metadata,
            slides: Vec::new(),
        }
    }

    pub fn metadata(&self) -> &DeckMetadata {
        &self.metadata
    }

    pub fn layout(&self) -> LayoutPreset {
        self.metadata.layout
    }

    /// Append a slide after all previously added slides.
    pub fn push_slide(&mut self, slide: SlideSpec) {
        self.slides.push(slide);
    }

    pub fn slides(&self) -> &[SlideSpec] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}
