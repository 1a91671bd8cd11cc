// ABOUTME: Deck assembly for the deckling application
// ABOUTME: Validates sources, converts slides in order and writes the finished deck

use crate::config::DeckConfig;
use crate::convert::SlideConverter;
use crate::errors::{DeckError, Result};
use crate::pptx;
use crate::slide::{Placeholder, Presentation};
use crate::utils;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckReport {
    pub output_path: PathBuf,
    pub slide_count: usize,
    /// Placeholder regions per slide, in slide order.
    pub placeholders: Vec<Vec<Placeholder>>,
}

/// Sequences slide conversions and the final write for one deck.
pub struct DeckAssembler<C> {
    converter: C,
}

impl<C: SlideConverter> DeckAssembler<C> {
    pub fn new(converter: C) -> Self {
        Self { converter }
    }

    /// Give back the converter, e.g. to shut down a browser.
    pub fn into_converter(self) -> C {
        self.converter
    }

    /// Build the deck described by `config` and write it to its output path.
    ///
    /// Fails fast: the first invalid source or failed conversion aborts the
    /// run and nothing is written.
    pub fn run(&mut self, config: &DeckConfig) -> Result<DeckReport> {
        let presentation = self.assemble(config)?;
        pptx::save_pptx(&presentation, &config.output_path)?;

        Ok(DeckReport {
            output_path: config.output_path.clone(),
            slide_count: presentation.slide_count(),
            placeholders: presentation
                .slides()
                .iter()
                .map(|s| s.placeholders.clone())
                .collect(),
        })
    }

    /// Validate every source, then convert them one by one.
    pub fn assemble(&mut self, config: &DeckConfig) -> Result<Presentation> {
        if config.slide_sources.is_empty() {
            return Err(DeckError::NoSlideSources);
        }
        for (index, source) in config.slide_sources.iter().enumerate() {
            utils::validate_slide_source(index, source)?;
        }

        let metadata = config.metadata();
        let layout = metadata.layout;
        info!(
            "Assembling {} slides ({}) titled {:?}",
            config.slide_sources.len(),
            layout,
            metadata.title
        );
        let mut presentation = Presentation::new(metadata);

        let start_time = Instant::now();
        for (index, source) in config.slide_sources.iter().enumerate() {
            info!("Converting slide {}: {:?}", index + 1, source);
            let slide = self
                .converter
                .convert(source, layout)
                .map_err(|source_err| DeckError::ConversionFailed {
                    index,
                    path: source.clone(),
                    source: source_err,
                })?;
            presentation.push_slide(slide);
        }
        info!(
            "Converted {} slides in {:.2} seconds",
            presentation.slide_count(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(presentation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConvertError;
    use crate::layout::LayoutPreset;
    use crate::slide::SlideSpec;
    use std::path::Path;

    /// Records calls and fails on a chosen slide.
    struct ScriptedConverter {
        calls: Vec<PathBuf>,
        fail_on: Option<usize>,
    }

    impl SlideConverter for ScriptedConverter {
        fn convert(&mut self, source: &Path, _layout: LayoutPreset) -> std::result::Result<SlideSpec, ConvertError> {
            self.calls.push(source.to_path_buf());
            if self.fail_on == Some(self.calls.len() - 1) {
                return Err(ConvertError::Parse("broken markup".to_string()));
            }
            Ok(SlideSpec::default())
        }
    }

    #[test]
    fn test_empty_source_list_is_rejected() {
        let mut assembler = DeckAssembler::new(ScriptedConverter {
            calls: Vec::new(),
            fail_on: None,
        });
        let config = DeckConfig::new(Vec::new(), "never.pptx");
        assert!(matches!(assembler.run(&config), Err(DeckError::NoSlideSources)));
        assert!(!Path::new("never.pptx").exists());
    }

    #[test]
    fn test_missing_source_stops_before_converting() {
        let dir = tempfile::TempDir::new().unwrap();
        let present = dir.path().join("one.html");
        std::fs::write(&present, "<p>x</p>").unwrap();
        let config = DeckConfig::new(
            vec![present, dir.path().join("two.html")],
            dir.path().join("deck.pptx"),
        );

        let mut assembler = DeckAssembler::new(ScriptedConverter {
            calls: Vec::new(),
            fail_on: None,
        });
        match assembler.assemble(&config) {
            Err(DeckError::SourceNotFound { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected: {:?}", other.map(|p| p.slide_count())),
        }
        assert!(assembler.into_converter().calls.is_empty());
    }
}
