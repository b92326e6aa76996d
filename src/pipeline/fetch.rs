//! Remote fetcher: download an image over HTTP into memory.
//!
//! The orchestrator only sees the [`Fetcher`] trait, so tests can swap in a
//! stub that counts calls. [`HttpFetcher`] is the real implementation.
//!
//! Two failures are kept apart because callers react to them differently:
//!
//! * [`RenderError::Network`] — the request never produced a response
//!   (DNS failure, refused connection, timeout, body cut off).
//! * [`RenderError::Transport`] — the server answered with a non-2xx status.

use crate::error::RenderError;
use crate::pipeline::data_url::Blob;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info};

/// Fallback content type when neither the header nor the bytes identify one.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Retrieves a binary resource from a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Blob, RenderError>;
}

/// [`Fetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, RenderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("roomify-render/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RenderError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared connection pool, custom TLS, …).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Blob, RenderError> {
        info!("Fetching image from: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Transport {
                url: url.to_string(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(essence)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| network_error(url, &e))?;

        let mime_type = declared.unwrap_or_else(|| sniff_mime(&bytes).to_string());
        debug!("Fetched {} bytes ({}) from {}", bytes.len(), mime_type, url);

        Ok(Blob::new(mime_type, bytes.to_vec()))
    }
}

fn network_error(url: &Url, e: &reqwest::Error) -> RenderError {
    let reason = if e.is_timeout() {
        format!("request timed out ({e})")
    } else {
        e.to_string()
    };
    RenderError::Network {
        url: url.to_string(),
        reason,
    }
}

/// `image/png; charset=binary` → `image/png`.
fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

/// Guess a MIME type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(OCTET_STREAM)
}
