use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_deckling"))
        .args(args)
        .env_remove("DECKLING_RENDERER")
        .env_remove("DECKLING_TIMEOUT_MS")
        .output()
        .expect("Failed to execute command")
}

fn write_slide(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, format!("<html><body>{}</body></html>", body)).expect("Failed to write slide");
    path.to_str().unwrap().to_string()
}

#[test]
fn test_build_command() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "01-intro.html", "<h1>Intro</h1>");
    write_slide(temp_dir.path(), "02-details.html", "<p>Details</p>");
    let output_path = temp_dir.path().join("out/deck.pptx");
    let pattern = format!("{}/*.html", temp_dir.path().display());

    let output = run_command(&[
        "build",
        &pattern,
        "-o",
        output_path.to_str().unwrap(),
        "--title",
        "CLI Deck",
        "--layout",
        "16:10",
        "--renderer",
        "markup",
    ]);

    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 slides"));
    assert!(stdout.contains("LAYOUT_16x10"));
    assert!(output_path.exists());
}

#[test]
fn test_build_with_manifest_and_override() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write_slide(temp_dir.path(), "slide1.html", "<h1>Only</h1>");
    let manifest = temp_dir.path().join("deck.json");
    fs::write(
        &manifest,
        r#"{"slideSources": ["slide1.html"], "outputPath": "from-manifest.pptx", "title": "Manifest"}"#,
    )
    .expect("Failed to write manifest");
    let override_path = temp_dir.path().join("override.pptx");

    let output = run_command(&[
        "build",
        "--manifest",
        manifest.to_str().unwrap(),
        "-o",
        override_path.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(override_path.exists());
    assert!(!temp_dir.path().join("from-manifest.pptx").exists());
}

#[test]
fn test_missing_slide_exit_code() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output_path = temp_dir.path().join("deck.pptx");
    let missing = temp_dir.path().join("nope.html");

    let output = run_command(&[
        "build",
        missing.to_str().unwrap(),
        "-o",
        output_path.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("SourceNotFound"));
    assert!(!output_path.exists());
}

#[test]
fn test_conversion_failure_exit_code() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let good = write_slide(temp_dir.path(), "good.html", "<p>Fine</p>");
    let bad = write_slide(temp_dir.path(), "bad.html", "<div>Unwrapped text</div>");
    let output_path = temp_dir.path().join("deck.pptx");

    let output = run_command(&["build", &good, &bad, "-o", output_path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ConversionFailed"));
    assert!(stderr.contains("Slide 2"));
    assert!(!output_path.exists());
}

#[test]
fn test_write_failure_exit_code() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let slide = write_slide(temp_dir.path(), "slide.html", "<p>x</p>");
    let blocker = temp_dir.path().join("blocker");
    fs::write(&blocker, "a file, not a directory").expect("Failed to write blocker");
    let output_path = blocker.join("deck.pptx");

    let output = run_command(&["build", &slide, "-o", output_path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("WriteFailed"));
    assert!(blocker.is_file());
}

#[test]
fn test_unknown_layout_is_config_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let slide = write_slide(temp_dir.path(), "slide.html", "<p>x</p>");
    let output_path = temp_dir.path().join("deck.pptx");

    let output = run_command(&["build", &slide, "-o", output_path.to_str().unwrap(), "--layout", "3:2"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ConfigError"));
}

#[test]
fn test_check_command_reports_problems() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let good = write_slide(temp_dir.path(), "good.html", "<p>Fine</p>");
    let bad = write_slide(temp_dir.path(), "bad.html", "<ul><li>- typed bullet</li></ul>");

    let output = run_command(&["check", &good, &bad]);

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok"));
    assert!(stdout.contains("FAIL"));
    // check never writes a deck
    let entries = fs::read_dir(temp_dir.path()).unwrap().count();
    assert_eq!(entries, 2);
}

#[test]
fn test_layouts_command() {
    let output = run_command(&["layouts"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["LAYOUT_16x9", "LAYOUT_16x10", "LAYOUT_4x3", "LAYOUT_WIDE"] {
        assert!(stdout.contains(name), "missing {}", name);
    }
}
