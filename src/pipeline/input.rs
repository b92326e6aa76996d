//! Input resolution: turn a user-supplied string or file into a [`SourceImage`].
//!
//! A source image is either already inline (a data-URL) or a remote reference
//! that has to be fetched first. Local files are read and encoded straight
//! away, so by the time they reach the orchestrator they are inline too.
//!
//! The upload surface only accepts JPEG and PNG. The check uses the file's
//! declared type (its extension), the same signal a browser file picker
//! reports, and runs before any byte is read.

use crate::error::RenderError;
use crate::pipeline::data_url::{self, DataUrl};
use image::ImageFormat;
use reqwest::Url;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// MIME types accepted from local files.
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// An image the pipeline can work on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImage {
    /// Image data already in hand.
    Inline(DataUrl),
    /// Absolute http(s) URL that must be fetched before decoding.
    Remote(Url),
}

impl SourceImage {
    /// Classify a string as inline data or a remote URL.
    ///
    /// Anything that is neither a `data:` value nor an absolute http(s) URL
    /// is rejected with [`RenderError::InvalidInput`]. Use [`Self::resolve`]
    /// when the string may also be a local path.
    pub fn parse(input: &str) -> Result<Self, RenderError> {
        let trimmed = input.trim();
        if data_url::is_data_url(trimmed) {
            return Ok(SourceImage::Inline(DataUrl::new(trimmed)));
        }
        if is_url(trimmed) {
            if let Ok(url) = Url::parse(trimmed) {
                return Ok(SourceImage::Remote(url));
            }
        }
        Err(RenderError::InvalidInput {
            input: input.to_string(),
        })
    }

    /// Read an allow-listed local image and encode it inline.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let mime_type = check_file_type(path)?;

        let file = match tokio::fs::File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => return Err(RenderError::Read { source }),
        };

        let url = data_url::encode(file, mime_type).await?;
        debug!("Loaded {} as {}", path.display(), url.preview());
        Ok(SourceImage::Inline(url))
    }

    /// Accept a data-URL, an http(s) URL or a local file path.
    pub async fn resolve(input: &str) -> Result<Self, RenderError> {
        let trimmed = input.trim();
        if data_url::is_data_url(trimmed) || is_url(trimmed) {
            return Self::parse(trimmed);
        }
        let path = PathBuf::from(trimmed);
        if !path.exists() {
            return Err(RenderError::InvalidInput {
                input: input.to_string(),
            });
        }
        Self::from_file(path).await
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, SourceImage::Inline(_))
    }
}

impl From<DataUrl> for SourceImage {
    fn from(url: DataUrl) -> Self {
        SourceImage::Inline(url)
    }
}

impl From<Url> for SourceImage {
    fn from(url: Url) -> Self {
        SourceImage::Remote(url)
    }
}

impl fmt::Display for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceImage::Inline(url) => f.write_str(&url.preview()),
            SourceImage::Remote(url) => write!(f, "{url}"),
        }
    }
}

impl Serialize for SourceImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SourceImage::Inline(url) => serializer.serialize_str(url.as_str()),
            SourceImage::Remote(url) => serializer.serialize_str(url.as_str()),
        }
    }
}

/// Check if the input string looks like an http(s) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether a MIME type may enter the pipeline from a file upload.
pub fn is_allowed_mime(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
}

/// Declared MIME type of a local file, judged by its extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type())
}

/// Return the declared MIME type if it is on the allow-list.
pub fn check_file_type(path: &Path) -> Result<&'static str, RenderError> {
    match mime_for_path(path) {
        Some(mime) if is_allowed_mime(mime) => Ok(mime),
        other => Err(RenderError::UnsupportedFileType {
            path: path.to_path_buf(),
            mime_type: other.unwrap_or("unknown").to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/plan.png"));
        assert!(is_url("http://example.com/plan.png"));
        assert!(!is_url("/tmp/plan.png"));
        assert!(!is_url("data:image/png;base64,Qg=="));
        assert!(!is_url(""));
    }

    #[test]
    fn parse_classifies_inline_and_remote() {
        let inline = SourceImage::parse("data:image/png;base64,Qg==").unwrap();
        assert!(inline.is_inline());

        let remote = SourceImage::parse("https://x/img.png").unwrap();
        match remote {
            SourceImage::Remote(url) => assert_eq!(url.as_str(), "https://x/img.png"),
            other => panic!("expected remote, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_relative_paths() {
        let err = SourceImage::parse("plan.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn allow_list_matches_upload_surface() {
        assert!(is_allowed_mime("image/png"));
        assert!(is_allowed_mime("image/jpeg"));
        assert!(is_allowed_mime("image/jpg"));
        assert!(is_allowed_mime("IMAGE/PNG"));
        assert!(!is_allowed_mime("image/gif"));
        assert!(!is_allowed_mime("image/webp"));
    }

    #[test]
    fn check_file_type_uses_extension() {
        assert_eq!(check_file_type(Path::new("plan.PNG")).unwrap(), "image/png");
        assert_eq!(check_file_type(Path::new("plan.jpg")).unwrap(), "image/jpeg");
        assert_eq!(check_file_type(Path::new("plan.jpeg")).unwrap(), "image/jpeg");

        let err = check_file_type(Path::new("plan.gif")).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFileType { .. }));
        let err = check_file_type(Path::new("plan")).unwrap_err();
        assert!(err.to_string().contains("unknown"));
    }

    #[tokio::test]
    async fn from_file_encodes_allowed_image() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(b"B").unwrap();

        let source = SourceImage::from_file(tmp.path()).await.unwrap();
        assert_eq!(
            source,
            SourceImage::Inline(DataUrl::new("data:image/png;base64,Qg=="))
        );
    }

    #[tokio::test]
    async fn from_file_rejects_before_reading() {
        // The file does not exist: the type check must fire first.
        let err = SourceImage::from_file("/definitely/not/here.bmp")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFileType { .. }));
    }

    #[tokio::test]
    async fn from_file_reports_missing_file() {
        let err = SourceImage::from_file("/definitely/not/here.png")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn resolve_accepts_all_three_shapes() {
        let mut tmp = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        tmp.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();
        let path = tmp.path().to_string_lossy().to_string();

        assert!(SourceImage::resolve(&path).await.unwrap().is_inline());
        assert!(SourceImage::resolve("data:image/png;base64,Qg==")
            .await
            .unwrap()
            .is_inline());
        assert!(!SourceImage::resolve("https://x/img.png")
            .await
            .unwrap()
            .is_inline());

        let err = SourceImage::resolve("nope/missing.png").await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidInput { .. }));
    }
}
