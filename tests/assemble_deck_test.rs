use deckling::{
    ConvertError, DeckAssembler, DeckConfig, DeckError, LayoutPreset, MarkupConverter,
    SlideConverter, SlideSpec,
};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Returns one text box per slide naming its source, and records every call.
struct EchoConverter {
    calls: Vec<PathBuf>,
    fail_at: Option<usize>,
}

impl EchoConverter {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            fail_at: None,
        }
    }
}

impl SlideConverter for EchoConverter {
    fn convert(&mut self, source: &Path, layout: LayoutPreset) -> Result<SlideSpec, ConvertError> {
        let index = self.calls.len();
        self.calls.push(source.to_path_buf());
        if self.fail_at == Some(index) {
            return Err(ConvertError::Parse(format!("cannot convert {}", source.display())));
        }
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let html = format!("<body><p>{}</p></body>", name);
        deckling::convert_markup(&html, Path::new("."), layout, &Default::default())
    }
}

fn create_sources(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, "<body><p>placeholder</p></body>").expect("Failed to write source");
            path
        })
        .collect()
}

fn read_part(deck: &Path, name: &str) -> String {
    let file = fs::File::open(deck).expect("Failed to open deck");
    let mut archive = zip::ZipArchive::new(file).expect("Deck is not a zip archive");
    let mut content = String::new();
    archive
        .by_name(name)
        .expect("Missing package part")
        .read_to_string(&mut content)
        .expect("Part is not UTF-8");
    content
}

fn slide_part_names(deck: &Path) -> Vec<String> {
    let file = fs::File::open(deck).expect("Failed to open deck");
    let archive = zip::ZipArchive::new(file).expect("Deck is not a zip archive");
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(String::from)
        .collect();
    names.sort();
    names
}

fn leftover_staging_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("Failed to list directory")
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "partial"))
        .collect()
}

#[test]
fn test_slides_keep_input_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let sources = create_sources(temp_dir.path(), &["gamma.html", "alpha.html", "beta.html"]);
    let output = temp_dir.path().join("ordered.pptx");

    let mut assembler = DeckAssembler::new(EchoConverter::new());
    let report = assembler
        .run(&DeckConfig::new(sources.clone(), &output))
        .expect("Deck run failed");

    assert_eq!(report.slide_count, 3);
    assert_eq!(assembler.into_converter().calls, sources);
    assert_eq!(slide_part_names(&output).len(), 3);
    assert!(read_part(&output, "ppt/slides/slide1.xml").contains("gamma"));
    assert!(read_part(&output, "ppt/slides/slide2.xml").contains("alpha"));
    assert!(read_part(&output, "ppt/slides/slide3.xml").contains("beta"));
    assert!(leftover_staging_files(temp_dir.path()).is_empty());
}

#[test]
fn test_failure_stops_at_the_failing_slide() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let sources = create_sources(temp_dir.path(), &["s1.html", "s2.html", "s3.html", "s4.html"]);
    let output = temp_dir.path().join("deck.pptx");

    let mut assembler = DeckAssembler::new(EchoConverter {
        calls: Vec::new(),
        fail_at: Some(1),
    });
    let err = assembler
        .run(&DeckConfig::new(sources.clone(), &output))
        .expect_err("Run should fail");

    match &err {
        DeckError::ConversionFailed { index, path, .. } => {
            assert_eq!(*index, 1);
            assert_eq!(path, &sources[1]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.kind(), "ConversionFailed");
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().starts_with("Slide 2"));

    // Slides after the failing one are never attempted
    assert_eq!(assembler.into_converter().calls, sources[..2].to_vec());
    assert!(!output.exists());
}

#[test]
fn test_missing_source_writes_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut sources = create_sources(temp_dir.path(), &["s1.html"]);
    sources.push(temp_dir.path().join("missing.html"));
    let output = temp_dir.path().join("deck.pptx");

    let mut assembler = DeckAssembler::new(EchoConverter::new());
    match assembler.run(&DeckConfig::new(sources, &output)) {
        Err(DeckError::SourceNotFound { index, .. }) => assert_eq!(index, 1),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(assembler.into_converter().calls.is_empty());
    assert!(!output.exists());
}

#[test]
fn test_empty_source_list() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = temp_dir.path().join("deck.pptx");

    let err = DeckAssembler::new(EchoConverter::new())
        .run(&DeckConfig::new(Vec::new(), &output))
        .expect_err("Empty deck should fail");
    assert!(matches!(err, DeckError::NoSlideSources));
    assert_eq!(err.exit_code(), 2);
    assert!(!output.exists());
}

#[test]
fn test_rerun_replaces_previous_deck() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let sources = create_sources(temp_dir.path(), &["one.html", "two.html"]);
    let output = temp_dir.path().join("deck.pptx");
    let config = DeckConfig::new(sources, &output);

    let first = DeckAssembler::new(EchoConverter::new()).run(&config).expect("First run failed");
    let first_slides = slide_part_names(&output);
    let second = DeckAssembler::new(EchoConverter::new()).run(&config).expect("Second run failed");

    assert_eq!(first, second);
    assert_eq!(slide_part_names(&output), first_slides);
    assert!(read_part(&output, "ppt/slides/slide2.xml").contains("two"));
    assert!(leftover_staging_files(temp_dir.path()).is_empty());
}

#[test]
fn test_ai_basics_deck() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let demo = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/ai-basics");
    for name in ["slide1.html", "slide2.html", "deck.json"] {
        fs::copy(demo.join(name), temp_dir.path().join(name)).expect("Failed to copy demo file");
    }

    let config = DeckConfig::from_manifest(&temp_dir.path().join("deck.json")).expect("Bad manifest");
    assert_eq!(config.output_path, temp_dir.path().join("ai-basics.pptx"));

    let report = DeckAssembler::new(MarkupConverter::default())
        .run(&config)
        .expect("Deck run failed");
    assert_eq!(report.slide_count, 2);

    let deck = temp_dir.path().join("ai-basics.pptx");
    let core = read_part(&deck, "docProps/core.xml");
    assert!(core.contains("<dc:creator>Claude Code</dc:creator>"));
    assert!(core.contains("<dc:title>AI Basics - Understanding AI</dc:title>"));

    let presentation = read_part(&deck, "ppt/presentation.xml");
    assert!(presentation.contains(r#"<p:sldSz cx="9144000" cy="5143500" type="screen16x9"/>"#));
    assert_eq!(presentation.matches("<p:sldId ").count(), 2);

    assert!(read_part(&deck, "ppt/slides/slide1.xml").contains("AI Basics"));
    assert!(read_part(&deck, "ppt/slides/slide2.xml").contains("Key Concepts"));
}
