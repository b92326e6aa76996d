//! Result types returned by the render entry points.

use crate::pipeline::data_url::DataUrl;
use serde::{Deserialize, Serialize};

/// Outcome of a render that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "image", rename_all = "snake_case")]
pub enum RenderResult {
    /// The rendered image, always inline.
    Rendered(DataUrl),
    /// The provider answered but supplied nothing usable.
    NoImageProduced,
}

impl RenderResult {
    pub fn image(&self) -> Option<&DataUrl> {
        match self {
            RenderResult::Rendered(url) => Some(url),
            RenderResult::NoImageProduced => None,
        }
    }

    pub fn into_image(self) -> Option<DataUrl> {
        match self {
            RenderResult::Rendered(url) => Some(url),
            RenderResult::NoImageProduced => None,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderResult::Rendered(_))
    }
}

/// Timing and bookkeeping for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Identity of the invocation that produced this output.
    pub invocation: u64,
    /// Provider that handled the request.
    pub provider: String,
    pub model: String,
    /// Number of remote fetches (input and output side).
    pub fetches: usize,
    /// MIME type of the image sent to the provider.
    pub source_mime_type: String,
    /// Base64 length of the image sent to the provider.
    pub source_payload_len: usize,
    pub normalize_duration_ms: u64,
    pub provider_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A render result plus its stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub result: RenderResult,
    pub stats: RenderStats,
}
