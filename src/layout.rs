// ABOUTME: Slide layout presets for the deckling application
// ABOUTME: Maps preset names to slide sizes in inches, pixels and EMUs

use crate::errors::DeckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// English Metric Units per inch, as used by PresentationML.
pub const EMU_PER_INCH: f64 = 914_400.0;
/// CSS pixels per inch.
pub const PX_PER_INCH: f64 = 96.0;
/// Points per CSS pixel.
pub const PT_PER_PX: f64 = 0.75;

/// Convert inches to EMUs, rounding to the nearest unit.
pub fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}

/// Enumerated slide size presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LayoutPreset {
    #[default]
    Widescreen16x9,
    Widescreen16x10,
    Standard4x3,
    Wide,
}

impl LayoutPreset {
    pub const ALL: [LayoutPreset; 4] = [
        LayoutPreset::Widescreen16x9,
        LayoutPreset::Widescreen16x10,
        LayoutPreset::Standard4x3,
        LayoutPreset::Wide,
    ];

    /// Canonical preset name.
    pub fn name(self) -> &'static str {
        match self {
            LayoutPreset::Widescreen16x9 => "LAYOUT_16x9",
            LayoutPreset::Widescreen16x10 => "LAYOUT_16x10",
            LayoutPreset::Standard4x3 => "LAYOUT_4x3",
            LayoutPreset::Wide => "LAYOUT_WIDE",
        }
    }

    /// Slide size in EMUs (width, height).
    pub fn size_emu(self) -> (i64, i64) {
        match self {
            LayoutPreset::Widescreen16x9 => (9_144_000, 5_143_500),
            LayoutPreset::Widescreen16x10 => (9_144_000, 5_715_000),
            LayoutPreset::Standard4x3 => (9_144_000, 6_858_000),
            LayoutPreset::Wide => (12_192_000, 6_858_000),
        }
    }

    /// Slide size in inches (width, height).
    pub fn size_inches(self) -> (f64, f64) {
        let (cx, cy) = self.size_emu();
        (cx as f64 / EMU_PER_INCH, cy as f64 / EMU_PER_INCH)
    }

    /// Slide size in CSS pixels (width, height).
    pub fn size_px(self) -> (u32, u32) {
        let (w, h) = self.size_inches();
        (
            (w * PX_PER_INCH).round() as u32,
            (h * PX_PER_INCH).round() as u32,
        )
    }

    /// The `type` attribute of `<p:sldSz>`.
    pub fn pptx_size_type(self) -> &'static str {
        match self {
            LayoutPreset::Widescreen16x9 => "screen16x9",
            LayoutPreset::Widescreen16x10 => "screen16x10",
            LayoutPreset::Standard4x3 => "screen4x3",
            LayoutPreset::Wide => "custom",
        }
    }
}

impl fmt::Display for LayoutPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayoutPreset {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("layout_").unwrap_or(&normalized);
        match normalized {
            "16x9" | "16:9" | "widescreen" => Ok(LayoutPreset::Widescreen16x9),
            "16x10" | "16:10" => Ok(LayoutPreset::Widescreen16x10),
            "4x3" | "4:3" | "standard" => Ok(LayoutPreset::Standard4x3),
            "wide" | "13.33x7.5" => Ok(LayoutPreset::Wide),
            _ => Err(DeckError::ConfigError(format!(
                "Unknown layout preset: {} (expected one of {})",
                s,
                LayoutPreset::ALL.map(|l| l.name()).join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for LayoutPreset {
    type Error = DeckError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LayoutPreset> for String {
    fn from(layout: LayoutPreset) -> Self {
        layout.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("16:9".parse::<LayoutPreset>().unwrap(), LayoutPreset::Widescreen16x9);
        assert_eq!("LAYOUT_16x9".parse::<LayoutPreset>().unwrap(), LayoutPreset::Widescreen16x9);
        assert_eq!("layout_wide".parse::<LayoutPreset>().unwrap(), LayoutPreset::Wide);
        assert_eq!("4:3".parse::<LayoutPreset>().unwrap(), LayoutPreset::Standard4x3);
        assert!("5:4".parse::<LayoutPreset>().is_err());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(LayoutPreset::Widescreen16x9.size_px(), (960, 540));
        let (w, h) = LayoutPreset::Widescreen16x9.size_inches();
        assert!((w - 10.0).abs() < 1e-9);
        assert!((h - 5.625).abs() < 1e-9);
        assert_eq!(inches_to_emu(1.0), 914_400);
    }
}
