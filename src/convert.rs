// ABOUTME: HTML-to-slide conversion seam for the deckling application
// ABOUTME: Defines the converter trait and checks shared by every converter

use crate::errors::ConvertError;
use crate::layout::LayoutPreset;
use crate::slide::SlideSpec;
use std::path::Path;

/// Allowed difference between page and layout size, in inches.
pub const DIMENSION_TOLERANCE_IN: f64 = 0.1;

/// Characters that mark a hand-typed bullet inside a list item.
const MANUAL_BULLETS: [char; 3] = ['•', '-', '*'];

/// Bullet characters that also start ordinary text (`-40%`, `*emphasis*`).
const AMBIGUOUS_BULLETS: [char; 2] = ['-', '*'];

/// Turns one HTML slide source into one slide description.
///
/// Implementations are called strictly one slide at a time and may keep
/// state (such as a running browser) between calls.
pub trait SlideConverter {
    fn convert(&mut self, source: &Path, layout: LayoutPreset) -> Result<SlideSpec, ConvertError>;
}

impl<C: SlideConverter + ?Sized> SlideConverter for Box<C> {
    fn convert(&mut self, source: &Path, layout: LayoutPreset) -> Result<SlideSpec, ConvertError> {
        (**self).convert(source, layout)
    }
}

/// Fail when a declared page size differs from the layout.
pub fn check_dimensions(
    layout: LayoutPreset,
    actual_w: f64,
    actual_h: f64,
) -> Result<(), ConvertError> {
    let (expected_w, expected_h) = layout.size_inches();
    if (actual_w - expected_w).abs() > DIMENSION_TOLERANCE_IN
        || (actual_h - expected_h).abs() > DIMENSION_TOLERANCE_IN
    {
        return Err(ConvertError::DimensionMismatch {
            expected_w,
            expected_h,
            actual_w,
            actual_h,
        });
    }
    Ok(())
}

/// Fail when content extends past the slide edges (inches in, points out).
pub fn check_overflow(
    layout: LayoutPreset,
    content_right: f64,
    content_bottom: f64,
) -> Result<(), ConvertError> {
    let (w, h) = layout.size_inches();
    let horizontal_pt = ((content_right - w) * 72.0).max(0.0);
    let vertical_pt = ((content_bottom - h) * 72.0).max(0.0);
    // sub-point overflow comes from rounding
    if horizontal_pt > 1.0 || vertical_pt > 1.0 {
        return Err(ConvertError::Overflow {
            horizontal_pt,
            vertical_pt,
        });
    }
    Ok(())
}

/// Problem description when a list item starts with a typed bullet.
pub fn manual_bullet_problem(item_text: &str) -> Option<String> {
    let trimmed = item_text.trim_start();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    // `-` and `*` only count as bullets when followed by whitespace
    let spaced = chars.next().map_or(true, char::is_whitespace);
    if MANUAL_BULLETS.contains(&first) && (spaced || !AMBIGUOUS_BULLETS.contains(&first)) {
        let preview: String = trimmed.chars().take(40).collect();
        Some(format!(
            "List item starts with a manual bullet symbol ({:?}); use <ul>/<ol> markers instead: {:?}",
            first, preview
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_tolerance() {
        assert!(check_dimensions(LayoutPreset::Widescreen16x9, 10.05, 5.6).is_ok());
        match check_dimensions(LayoutPreset::Widescreen16x9, 10.0, 7.5) {
            Err(ConvertError::DimensionMismatch { actual_h, .. }) => assert_eq!(actual_h, 7.5),
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_overflow_reports_points() {
        assert!(check_overflow(LayoutPreset::Widescreen16x9, 10.0, 5.6).is_ok());
        match check_overflow(LayoutPreset::Widescreen16x9, 9.0, 6.625) {
            Err(ConvertError::Overflow { vertical_pt, horizontal_pt }) => {
                assert!((vertical_pt - 72.0).abs() < 1e-6);
                assert_eq!(horizontal_pt, 0.0);
            }
            other => panic!("expected overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_manual_bullets() {
        assert!(manual_bullet_problem("• First point").is_some());
        assert!(manual_bullet_problem("  - dash").is_some());
        assert!(manual_bullet_problem("Plain item").is_none());
        assert!(manual_bullet_problem("").is_none());
        assert!(manual_bullet_problem("* starred").is_some());
        assert!(manual_bullet_problem("•Tight").is_some());
        assert!(manual_bullet_problem("-40% latency").is_none());
        assert!(manual_bullet_problem("*Bold* claim").is_none());
    }
}
