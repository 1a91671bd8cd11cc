use super::*;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_slide(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(
        &path,
        format!(
            "<!DOCTYPE html><html><head><style>body {{ font-family: Arial; }}</style></head><body>{}</body></html>",
            body
        ),
    )
    .expect("Failed to write slide");
    path
}

fn read_part(deck: &Path, name: &str) -> String {
    let file = fs::File::open(deck).expect("Failed to open deck");
    let mut archive = zip::ZipArchive::new(file).expect("Deck is not a zip archive");
    let mut part = archive.by_name(name).expect("Missing package part");
    let mut content = String::new();
    part.read_to_string(&mut content).expect("Part is not UTF-8");
    content
}

#[test]
fn test_markup_deck_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let first = write_slide(temp_dir.path(), "slide1.html", "<h1>Welcome</h1><p>Intro &amp; overview</p>");
    let second = write_slide(temp_dir.path(), "slide2.html", "<h2>Agenda</h2><ul><li>One</li><li>Two</li></ul>");
    let output = temp_dir.path().join("deck.pptx");

    let mut config = DeckConfig::new(vec![first, second], &output);
    config.title = "Round Trip".to_string();
    let report = DeckAssembler::new(MarkupConverter::default())
        .run(&config)
        .expect("Deck run failed");

    assert_eq!(report.slide_count, 2);
    assert_eq!(report.output_path, output);

    let slide1 = read_part(&output, "ppt/slides/slide1.xml");
    let slide2 = read_part(&output, "ppt/slides/slide2.xml");
    assert!(slide1.contains("Welcome"));
    assert!(slide1.contains("Intro &amp; overview"));
    assert!(slide2.contains("Agenda"));
    assert!(slide2.contains("<a:buChar"));
    assert!(read_part(&output, "docProps/core.xml").contains("<dc:title>Round Trip</dc:title>"));
}

#[test]
fn test_conversion_failure_names_the_slide() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let good = write_slide(temp_dir.path(), "good.html", "<p>Fine</p>");
    let bad = write_slide(temp_dir.path(), "bad.html", "<div>Loose text</div>");
    let output = temp_dir.path().join("deck.pptx");

    let config = DeckConfig::new(vec![good, bad.clone()], &output);
    match DeckAssembler::new(MarkupConverter::default()).run(&config) {
        Err(DeckError::ConversionFailed { index, path, source }) => {
            assert_eq!(index, 1);
            assert_eq!(path, bad);
            assert!(matches!(source, ConvertError::Validation(_)));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!output.exists());
}

#[test]
fn test_layout_sets_slide_size() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let slide = write_slide(temp_dir.path(), "slide.html", "<p>Square</p>");
    let output = temp_dir.path().join("nested/dir/deck.pptx");

    let mut config = DeckConfig::new(vec![slide], &output);
    config.layout_preset = LayoutPreset::Standard4x3;
    DeckAssembler::new(MarkupConverter::default())
        .run(&config)
        .expect("Deck run failed");

    let presentation = read_part(&output, "ppt/presentation.xml");
    assert!(presentation.contains(r#"<p:sldSz cx="9144000" cy="6858000" type="screen4x3"/>"#));
}

#[test]
fn test_placeholders_are_reported() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let slide = write_slide(
        temp_dir.path(),
        "chart.html",
        r#"<h2>Growth</h2><div id="growth-chart" class="placeholder" style="width: 4in; height: 2in"></div>"#,
    );
    let output = temp_dir.path().join("deck.pptx");

    let report = DeckAssembler::new(MarkupConverter::default())
        .run(&DeckConfig::new(vec![slide], &output))
        .expect("Deck run failed");

    assert_eq!(report.placeholders.len(), 1);
    let placeholder = &report.placeholders[0][0];
    assert_eq!(placeholder.id, "growth-chart");
    assert!((placeholder.frame.w - 4.0).abs() < 1e-9);
    assert!((placeholder.frame.h - 2.0).abs() < 1e-9);
}

#[test]
fn test_odd_but_valid_content_converts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let slide = write_slide(
        temp_dir.path(),
        "metrics.html",
        r#"<p style="color: #aaaaaéa">Broken color</p><ul><li>-40% latency</li><li>*Bold* claim</li></ul>"#,
    );
    let output = temp_dir.path().join("deck.pptx");

    let report = DeckAssembler::new(MarkupConverter::default())
        .run(&DeckConfig::new(vec![slide], &output))
        .expect("Deck run failed");

    assert_eq!(report.slide_count, 1);
    let slide1 = read_part(&output, "ppt/slides/slide1.xml");
    assert!(slide1.contains("Broken color"));
    assert!(slide1.contains("-40% latency"));
}
