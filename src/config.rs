// ABOUTME: Configuration module for the deckling application
// ABOUTME: Provides process settings from the environment and per-run deck configuration

use crate::errors::{DeckError, Result};
use crate::layout::LayoutPreset;
use crate::slide::DeckMetadata;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which converter turns HTML into slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Renderer {
    /// Built-in flow layout, no browser needed
    #[default]
    Markup,
    /// Headless Chrome with full CSS layout
    Browser,
}

impl FromStr for Renderer {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markup" => Ok(Renderer::Markup),
            "browser" | "chrome" => Ok(Renderer::Browser),
            other => Err(DeckError::ConfigError(format!(
                "Unknown renderer: {} (expected markup or browser)",
                other
            ))),
        }
    }
}

impl fmt::Display for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Renderer::Markup => "markup",
            Renderer::Browser => "browser",
        })
    }
}

/// Process-wide settings
pub struct Config {
    pub browser_path: Option<String>,
    pub timeout_ms: u64,
    pub renderer: Renderer,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_path: None,
            timeout_ms: 30000, // 30 seconds
            renderer: Renderer::Markup,
        }
    }
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let browser_path = env::var("BROWSER_PATH").ok().filter(|p| !p.is_empty());
        let timeout_ms = match env::var("DECKLING_TIMEOUT_MS") {
            Ok(value) => value.parse::<u64>().map_err(|_| {
                DeckError::ConfigError(format!("DECKLING_TIMEOUT_MS is not a number: {}", value))
            })?,
            Err(_) => 30000,
        };
        let renderer = match env::var("DECKLING_RENDERER") {
            Ok(value) if !value.is_empty() => value.parse()?,
            _ => Renderer::Markup,
        };

        Ok(Self {
            browser_path,
            timeout_ms,
            renderer,
        })
    }
}

/// Everything one deck run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckConfig {
    #[serde(default)]
    pub slide_sources: Vec<PathBuf>,
    pub output_path: PathBuf,
    #[serde(default, alias = "layout")]
    pub layout_preset: LayoutPreset,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "Presentation".to_string()
}

impl DeckConfig {
    pub fn new(slide_sources: Vec<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            slide_sources,
            output_path: output_path.into(),
            layout_preset: LayoutPreset::default(),
            author: String::new(),
            title: default_title(),
        }
    }

    /// Read a JSON manifest; relative paths resolve against its directory.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            DeckError::ConfigError(format!("Failed to read manifest {:?}: {}", path, e))
        })?;
        let mut config: DeckConfig = serde_json::from_str(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.slide_sources = config
            .slide_sources
            .iter()
            .map(|source| utils::resolve_against(base, source))
            .collect();
        config.output_path = utils::resolve_against(base, &config.output_path);
        Ok(config)
    }

    pub fn metadata(&self) -> DeckMetadata {
        DeckMetadata {
            layout: self.layout_preset,
            author: self.author.clone(),
            title: self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("deck.json");
        fs::write(
            &manifest,
            r#"{
                "slideSources": ["slide1.html", "slide2.html"],
                "outputPath": "ai-basics.pptx",
                "layoutPreset": "16:9",
                "author": "Claude Code",
                "title": "AI Basics - Understanding AI"
            }"#,
        )
        .unwrap();

        let config = DeckConfig::from_manifest(&manifest).unwrap();
        assert_eq!(config.slide_sources[1], dir.path().join("slide2.html"));
        assert_eq!(config.output_path, dir.path().join("ai-basics.pptx"));
        assert_eq!(config.layout_preset, LayoutPreset::Widescreen16x9);
        assert_eq!(config.author, "Claude Code");
    }

    #[test]
    fn test_manifest_rejects_unknown_layout() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("deck.json");
        fs::write(&manifest, r#"{"outputPath": "x.pptx", "layoutPreset": "3:2"}"#).unwrap();
        assert!(matches!(
            DeckConfig::from_manifest(&manifest),
            Err(DeckError::ConfigError(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = DeckConfig::new(vec![], "out.pptx");
        assert_eq!(config.title, "Presentation");
        assert_eq!(config.metadata().layout, LayoutPreset::Widescreen16x9);
        assert_eq!("chrome".parse::<Renderer>().unwrap(), Renderer::Browser);
    }
}
