//! Error types for the roomify-render library.
//!
//! Every hard failure is a [`RenderError`]. The pipeline never wraps an error
//! raised by a lower stage: a `Transport` from the fetcher reaches the caller
//! of [`crate::render::render`] exactly as the fetcher produced it.
//!
//! "The provider rendered nothing" is **not** an error. It is returned as
//! [`crate::output::RenderResult::NoImageProduced`] so callers can tell a
//! provider that *failed* apart from one that *declined*.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the roomify-render library.
#[derive(Debug, Error)]
pub enum RenderError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The HTTP request never completed (DNS, connect, timeout, body read).
    #[error("Network error fetching '{url}': {reason}\nCheck your internet connection.")]
    Network { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("Failed to fetch image '{url}': {status} {status_text}")]
    Transport {
        url: String,
        status: u16,
        status_text: String,
    },

    // ── Codec errors ──────────────────────────────────────────────────────
    /// A binary source could not be read to completion.
    #[error("Failed to read image data: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },

    /// The value is not structurally a base64 data-URL.
    #[error("Malformed data URL: {reason}")]
    MalformedDataUrl { reason: String },

    /// The data-URL parsed, but its MIME type or payload is empty.
    #[error("Invalid source image payload: {reason}")]
    InvalidPayload { reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The input string is neither a data-URL, an http(s) URL nor a file.
    #[error("Invalid input '{input}': not a data URL, a valid HTTP/HTTPS URL or an existing file")]
    InvalidInput { input: String },

    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file type is not on the upload allow-list.
    #[error("Unsupported file type '{mime_type}' for '{path}'\nOnly JPEG and PNG images are accepted.")]
    UnsupportedFileType { path: PathBuf, mime_type: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("Image provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider call failed.
    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error category for callers that map errors to user messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Transport,
    Read,
    MalformedDataUrl,
    InvalidPayload,
    Input,
    Provider,
    Config,
    Internal,
}

impl RenderError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Network { .. } => ErrorKind::Network,
            RenderError::Transport { .. } => ErrorKind::Transport,
            RenderError::Read { .. } => ErrorKind::Read,
            RenderError::MalformedDataUrl { .. } => ErrorKind::MalformedDataUrl,
            RenderError::InvalidPayload { .. } => ErrorKind::InvalidPayload,
            RenderError::InvalidInput { .. }
            | RenderError::FileNotFound { .. }
            | RenderError::UnsupportedFileType { .. } => ErrorKind::Input,
            RenderError::ProviderNotConfigured { .. } | RenderError::Provider { .. } => {
                ErrorKind::Provider
            }
            RenderError::InvalidConfig(_) => ErrorKind::Config,
            RenderError::Internal(_) => ErrorKind::Internal,
        }
    }
}
