// ABOUTME: Error types for the deckling application
// ABOUTME: Separates deck-level failures from per-slide conversion failures

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while turning one HTML source into a slide description.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to read slide source: {0}")]
    Read(#[from] std::io::Error),

    #[error("HTML parse error: {0}")]
    Parse(String),

    #[error("Slide validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),

    #[error(
        "HTML content overflows the slide by {horizontal_pt:.1}pt horizontally and {vertical_pt:.1}pt vertically"
    )]
    Overflow { horizontal_pt: f64, vertical_pt: f64 },

    #[error(
        "HTML dimensions ({actual_w:.2}\" x {actual_h:.2}\") don't match the presentation layout ({expected_w:.2}\" x {expected_h:.2}\")"
    )]
    DimensionMismatch {
        expected_w: f64,
        expected_h: f64,
        actual_w: f64,
        actual_h: f64,
    },

    #[error("Headless browser error: {0}")]
    Browser(String),

    #[error("Failed to load image {src}: {message}")]
    Image { src: String, message: String },

    #[error("Failed to fetch remote resource: {0}")]
    Fetch(#[from] reqwest::Error),
}

// headless_chrome reports everything through anyhow
impl From<anyhow::Error> for ConvertError {
    fn from(err: anyhow::Error) -> Self {
        ConvertError::Browser(err.to_string())
    }
}

/// Failures of a whole deck run.
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("No slide sources were given")]
    NoSlideSources,

    #[error("Slide {} source not found: {path:?} ({reason})", .index + 1)]
    SourceNotFound {
        index: usize,
        path: PathBuf,
        reason: String,
    },

    #[error("Slide {} conversion failed for {path:?}: {source}", .index + 1)]
    ConversionFailed {
        index: usize,
        path: PathBuf,
        #[source]
        source: ConvertError,
    },

    #[error("Failed to write presentation to {path:?}: {message}")]
    WriteFailed { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),
}

impl DeckError {
    /// Stable name of the error kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeckError::NoSlideSources => "NoSlideSources",
            DeckError::SourceNotFound { .. } => "SourceNotFound",
            DeckError::ConversionFailed { .. } => "ConversionFailed",
            DeckError::WriteFailed { .. } => "WriteFailed",
            DeckError::ConfigError(_) => "ConfigError",
            DeckError::ValidationError(_) => "ValidationError",
            DeckError::FileReadError(_) => "FileReadError",
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeckError::NoSlideSources
            | DeckError::SourceNotFound { .. }
            | DeckError::ConfigError(_)
            | DeckError::ValidationError(_) => 2,
            DeckError::ConversionFailed { .. } => 3,
            DeckError::WriteFailed { .. } => 4,
            DeckError::FileReadError(_) => 1,
        }
    }
}

impl From<serde_json::Error> for DeckError {
    fn from(err: serde_json::Error) -> Self {
        DeckError::ConfigError(format!("Invalid manifest: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
