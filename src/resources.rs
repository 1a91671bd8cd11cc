// ABOUTME: Resource loading for the deckling application
// ABOUTME: Loads slide images from local paths, file:// URLs or remote URLs

use crate::errors::ConvertError;
use crate::slide::ImageData;
use log::{debug, info};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Where an image referenced by a slide lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Local(PathBuf),
    Remote(String),
}

impl ImageSource {
    /// Resolve an `src`/`url()` reference against the slide's directory.
    pub fn resolve(reference: &str, base_dir: &Path) -> Result<Self, ConvertError> {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(ImageSource::Remote(reference.to_string()));
        }
        if reference.starts_with("file:") {
            let url = Url::parse(reference).map_err(|e| ConvertError::Image {
                src: reference.to_string(),
                message: e.to_string(),
            })?;
            let path = url.to_file_path().map_err(|_| ConvertError::Image {
                src: reference.to_string(),
                message: "not a local file URL".to_string(),
            })?;
            return Ok(ImageSource::Local(path));
        }
        if reference.starts_with("data:") || reference.contains("://") {
            return Err(ConvertError::Image {
                src: truncate(reference),
                message: "unsupported image URL scheme".to_string(),
            });
        }
        Ok(ImageSource::Local(base_dir.join(reference)))
    }

    /// Load the image bytes and detect format and size.
    pub fn load(&self) -> Result<ImageData, ConvertError> {
        let bytes = match self {
            ImageSource::Local(path) => {
                debug!("Reading local image: {:?}", path);
                fs::read(path).map_err(|e| ConvertError::Image {
                    src: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
            ImageSource::Remote(url) => fetch_remote(url)?,
        };
        ImageData::from_bytes(bytes).map_err(|message| ConvertError::Image {
            src: self.to_string(),
            message,
        })
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Local(path) => write!(f, "{}", path.display()),
            ImageSource::Remote(url) => f.write_str(url),
        }
    }
}

/// Fetch a remote resource with retries and exponential backoff.
fn fetch_remote(url: &str) -> Result<Vec<u8>, ConvertError> {
    info!("Fetching remote image: {}", url);

    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    let mut retry_delay = 1000;
    let mut last_error = None;

    for attempt in 1..=3 {
        match client.get(url).send() {
            Ok(response) if response.status().is_success() => {
                return Ok(response.bytes()?.to_vec());
            }
            Ok(response) => {
                last_error = Some(ConvertError::Image {
                    src: url.to_string(),
                    message: format!("HTTP error: {}", response.status()),
                });
            }
            Err(e) => last_error = Some(ConvertError::Fetch(e)),
        }

        if attempt < 3 {
            info!(
                "Fetch attempt {} failed, retrying in {} ms",
                attempt, retry_delay
            );
            std::thread::sleep(Duration::from_millis(retry_delay));
            retry_delay *= 2;
        }
    }

    Err(last_error.unwrap_or_else(|| ConvertError::Image {
        src: url.to_string(),
        message: "unknown error fetching resource".to_string(),
    }))
}

fn truncate(reference: &str) -> String {
    reference.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_remote() {
        let base = Path::new("/decks/ai");
        assert_eq!(
            ImageSource::resolve("img/logo.png", base).unwrap(),
            ImageSource::Local(PathBuf::from("/decks/ai/img/logo.png"))
        );
        assert_eq!(
            ImageSource::resolve("https://example.com/a.png", base).unwrap(),
            ImageSource::Remote("https://example.com/a.png".to_string())
        );
        assert!(ImageSource::resolve("data:image/png;base64,AAAA", base).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_file_url() {
        let source = ImageSource::resolve("file:///tmp/chart.png", Path::new("/x")).unwrap();
        assert_eq!(source, ImageSource::Local(PathBuf::from("/tmp/chart.png")));
    }

    #[test]
    fn test_missing_local_image_is_reported() {
        let source = ImageSource::Local(PathBuf::from("/definitely/not/here.png"));
        match source.load() {
            Err(ConvertError::Image { src, .. }) => assert!(src.contains("here.png")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
