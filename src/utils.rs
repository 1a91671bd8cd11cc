// ABOUTME: Utility functions for the deckling application
// ABOUTME: Provides source validation, path handling and glob expansion helpers

use crate::errors::{DeckError, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Validate that a slide source is an existing, readable file.
pub fn validate_slide_source(index: usize, path: &Path) -> Result<()> {
    let not_found = |reason: &str| DeckError::SourceNotFound {
        index,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if !path.exists() {
        return Err(not_found("does not exist"));
    }
    if !path.is_file() {
        return Err(not_found("not a file"));
    }
    fs::File::open(path).map_err(|e| not_found(&e.to_string()))?;
    Ok(())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(DeckError::FileReadError)?;
    } else if !path.is_dir() {
        return Err(DeckError::ValidationError(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a file's parent directory exists
pub fn ensure_parent_directory_exists(file_path: &Path) -> Result<()> {
    match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_directory_exists(parent),
        _ => Ok(()),
    }
}

/// A unique hidden sibling of `output` for writing before the final rename.
pub fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deck.pptx".to_string());
    let staged = format!(".{}.{}.partial", name, uuid::Uuid::new_v4());
    match output.parent() {
        Some(parent) => parent.join(staged),
        None => PathBuf::from(staged),
    }
}

/// Expand glob patterns among slide arguments, keeping plain paths as given.
///
/// Matches of one pattern are sorted; argument order is preserved. A pattern
/// that matches nothing is kept literally so validation reports it.
pub fn expand_slide_sources(args: &[String]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for arg in args {
        if !arg.contains(['*', '?', '[']) {
            sources.push(PathBuf::from(arg));
            continue;
        }
        let mut matches: Vec<PathBuf> = glob::glob(arg)
            .map_err(|e| DeckError::ConfigError(format!("Invalid glob pattern {}: {}", arg, e)))?
            .flatten()
            .collect();
        matches.sort();
        debug!("Pattern {} matched {} files", arg, matches.len());
        if matches.is_empty() {
            sources.push(PathBuf::from(arg));
        } else {
            sources.extend(matches);
        }
    }
    Ok(sources)
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_slide_source() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("slide1.html");
        fs::write(&file, "<body></body>").unwrap();

        assert!(validate_slide_source(0, &file).is_ok());
        match validate_slide_source(3, &dir.path().join("missing.html")) {
            Err(DeckError::SourceNotFound { index, .. }) => assert_eq!(index, 3),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            validate_slide_source(0, dir.path()),
            Err(DeckError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn test_expand_slide_sources_sorts_matches() {
        let dir = TempDir::new().unwrap();
        for name in ["b.html", "a.html", "c.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let pattern = format!("{}/*.html", dir.path().display());
        let explicit = dir.path().join("c.txt").display().to_string();
        let sources = expand_slide_sources(&[explicit.clone(), pattern]).unwrap();
        assert_eq!(
            sources,
            vec![
                PathBuf::from(explicit),
                dir.path().join("a.html"),
                dir.path().join("b.html"),
            ]
        );
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staged = staging_path(Path::new("out/ai-basics.pptx"));
        assert_eq!(staged.parent(), Some(Path::new("out")));
        let name = staged.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".ai-basics.pptx."));
        assert!(name.ends_with(".partial"));
    }
}
