//! Render orchestration: source image → provider → rendered data-URL.
//!
//! ```text
//! SourceImage ──normalize──▶ DataUrl ──decode──▶ (mime, payload)
//!                                                    │
//!                                               provider.submit
//!                                                    │
//!        DataUrl ◀──normalize── Option<SourceImage> ◀┘
//! ```
//!
//! The provider may answer inline or with a link, which is the same pair of
//! shapes the caller may supply. Both ends therefore go through one
//! [`Renderer::normalize`] routine: inline values pass through untouched and
//! remote ones are fetched and encoded.
//!
//! Steps run strictly in order and nothing is retried. Fetch and codec errors
//! reach the caller unchanged. A provider that answers without an image
//! yields [`RenderResult::NoImageProduced`], not an error.

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::output::{RenderOutput, RenderResult, RenderStats};
use crate::pipeline::data_url::{self, DataUrl};
use crate::pipeline::fetch::{Fetcher, HttpFetcher};
use crate::pipeline::input::SourceImage;
use crate::pipeline::provider::{
    ChatImageProvider, GeminiImageProvider, ImageProvider, RenderRequest, Resolution,
    default_model_for, DEFAULT_PROVIDER,
};
use edgequake_llm::ProviderFactory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Identity of one render call, increasing per [`InvocationTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvocationId(pub u64);

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out invocation identities so callers can drop stale results.
///
/// Starting a render never cancels an earlier one. A UI that only cares about
/// the latest upload checks [`InvocationTracker::is_current`] before using a
/// result.
#[derive(Debug, Default)]
pub struct InvocationTracker {
    latest: AtomicU64,
}

impl InvocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new invocation; it becomes the current one.
    pub fn begin(&self) -> InvocationId {
        InvocationId(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The most recently started invocation, if any.
    pub fn latest(&self) -> Option<InvocationId> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(InvocationId(n)),
        }
    }

    /// Whether no newer invocation has started since `id`.
    pub fn is_current(&self, id: InvocationId) -> bool {
        self.latest.load(Ordering::SeqCst) == id.0
    }
}

/// Runs the render pipeline against a fetcher and a provider.
pub struct Renderer {
    fetcher: Arc<dyn Fetcher>,
    provider: Arc<dyn ImageProvider>,
    prompt: String,
    model: String,
    resolution: Resolution,
    invocations: InvocationTracker,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("resolution", &self.resolution)
            .field("invocations", &self.invocations)
            .finish()
    }
}

impl Renderer {
    /// Assemble a renderer from explicit parts. Prompt, model and resolution
    /// come from `config`; its provider settings are ignored.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        provider: Arc<dyn ImageProvider>,
        config: &RenderConfig,
    ) -> Self {
        Self {
            fetcher,
            provider: provider.clone(),
            prompt: config.prompt.clone(),
            model: effective_model(config, provider.name()),
            resolution: config.resolution,
            invocations: InvocationTracker::new(),
        }
    }

    /// Build an HTTP fetcher and resolve the provider from `config`.
    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        let fetcher = Arc::new(HttpFetcher::new(config.download_timeout_secs)?);
        let provider = resolve_provider(config)?;
        Ok(Self::new(fetcher, provider, config))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn invocations(&self) -> &InvocationTracker {
        &self.invocations
    }

    /// Bring any source image into inline form.
    ///
    /// Inline values are returned as is; remote ones are fetched once and
    /// encoded with the content type the server declared.
    pub async fn normalize(&self, source: SourceImage) -> Result<DataUrl, RenderError> {
        match source {
            SourceImage::Inline(url) => Ok(url),
            SourceImage::Remote(url) => {
                let blob = self.fetcher.fetch(&url).await?;
                Ok(data_url::encode_blob(&blob))
            }
        }
    }

    /// Render `source`, returning only the result.
    pub async fn render(&self, source: SourceImage) -> Result<RenderResult, RenderError> {
        self.render_detailed(source).await.map(|out| out.result)
    }

    /// Render `source` and report per-stage timings.
    pub async fn render_detailed(&self, source: SourceImage) -> Result<RenderOutput, RenderError> {
        self.render_tracked(source).await.1
    }

    /// [`Self::render_detailed`], also returning the invocation identity so
    /// failed renders can be matched to their request.
    pub async fn render_tracked(
        &self,
        source: SourceImage,
    ) -> (InvocationId, Result<RenderOutput, RenderError>) {
        let invocation = self.invocations.begin();
        let result = self.run(invocation, source).await;
        if let Err(ref e) = result {
            warn!("Render {}: failed: {}", invocation, e);
        }
        (invocation, result)
    }

    async fn run(
        &self,
        invocation: InvocationId,
        source: SourceImage,
    ) -> Result<RenderOutput, RenderError> {
        let total_start = Instant::now();
        let mut fetches = 0;
        info!("Render {}: starting from {}", invocation, source);

        // ── Step 1: Normalise input ──────────────────────────────────────
        let normalize_start = Instant::now();
        if !source.is_inline() {
            fetches += 1;
        }
        let source_url = self.normalize(source).await?;
        let normalize_duration_ms = normalize_start.elapsed().as_millis() as u64;

        // ── Step 2: Decode ───────────────────────────────────────────────
        let decoded = data_url::decode(&source_url)?;
        debug!(
            "Render {}: source is {} ({} bytes base64)",
            invocation,
            decoded.mime_type,
            decoded.payload.len()
        );

        // ── Step 3: Submit ───────────────────────────────────────────────
        let request = RenderRequest {
            prompt: self.prompt.clone(),
            model: self.model.clone(),
            mime_type: decoded.mime_type.to_string(),
            payload: decoded.payload.to_string(),
            resolution: self.resolution,
        };
        let provider_start = Instant::now();
        let reference = self.provider.submit(&request).await?;
        let provider_duration_ms = provider_start.elapsed().as_millis() as u64;

        let mut stats = RenderStats {
            invocation: invocation.0,
            provider: self.provider.name().to_string(),
            model: self.model.clone(),
            fetches,
            source_mime_type: request.mime_type,
            source_payload_len: request.payload.len(),
            normalize_duration_ms,
            provider_duration_ms,
            total_duration_ms: 0,
        };

        // ── Step 4: Interpret ────────────────────────────────────────────
        let Some(reference) = reference else {
            warn!("Render {}: provider produced no image", invocation);
            stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
            return Ok(RenderOutput {
                result: RenderResult::NoImageProduced,
                stats,
            });
        };

        // ── Step 5: Normalise output ─────────────────────────────────────
        if !reference.is_inline() {
            stats.fetches += 1;
        }
        let rendered = self.normalize(reference).await?;
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        info!(
            "Render {}: complete in {}ms ({} fetches) → {}",
            invocation,
            stats.total_duration_ms,
            stats.fetches,
            rendered.preview()
        );

        Ok(RenderOutput {
            result: RenderResult::Rendered(rendered),
            stats,
        })
    }
}

/// Render a source image with the provider described by `config`.
///
/// This is the primary entry point for the library. Each call builds its own
/// [`Renderer`], so the invocation id in the stats is always 1; callers that
/// need to drop stale results should keep one [`Renderer`] and use
/// [`Renderer::invocations`].
///
/// # Returns
/// * `Ok(RenderResult::Rendered(_))` — the rendered image as a data-URL
/// * `Ok(RenderResult::NoImageProduced)` — the provider declined
///
/// # Errors
/// Fetch, decode and provider failures, unchanged.
pub async fn render(source: SourceImage, config: &RenderConfig) -> Result<RenderResult, RenderError> {
    Renderer::from_config(config)?.render(source).await
}

/// [`render`] with stats.
///
/// Like [`render`], every call starts a fresh [`InvocationTracker`].
pub async fn render_detailed(
    source: SourceImage,
    config: &RenderConfig,
) -> Result<RenderOutput, RenderError> {
    Renderer::from_config(config)?.render_detailed(source).await
}

/// Render a data-URL, http(s) URL or local JPEG/PNG path.
pub async fn render_input(
    input: impl AsRef<str>,
    config: &RenderConfig,
) -> Result<RenderOutput, RenderError> {
    let source = SourceImage::resolve(input.as_ref()).await?;
    render_detailed(source, config).await
}

/// Synchronous wrapper around [`render_input`].
///
/// Creates a temporary tokio runtime internally.
pub fn render_sync(
    input: impl AsRef<str>,
    config: &RenderConfig,
) -> Result<RenderOutput, RenderError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RenderError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(render_input(input, config))
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Model from config, then `ROOMIFY_MODEL`, then the provider's default.
fn effective_model(config: &RenderConfig, provider: &str) -> String {
    pick_model(
        config.model.as_deref(),
        std::env::var("ROOMIFY_MODEL").ok(),
        provider,
    )
}

fn pick_model(explicit: Option<&str>, from_env: Option<String>, provider: &str) -> String {
    if let Some(model) = explicit {
        return model.to_string();
    }
    match from_env {
        Some(model) if !model.is_empty() => model,
        _ => default_model_for(provider).to_string(),
    }
}

/// Resolve the image provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as is.
/// 2. **Named provider** (`config.provider_name`).
/// 3. **`ROOMIFY_PROVIDER`** environment variable.
/// 4. **Gemini key present** (`config.api_key` or `GEMINI_API_KEY`).
/// 5. **Auto-detection** (`ProviderFactory::from_env`) for chat providers.
pub fn resolve_provider(config: &RenderConfig) -> Result<Arc<dyn ImageProvider>, RenderError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name
    if let Some(ref name) = config.provider_name {
        return create_provider(name, &effective_model(config, name), config);
    }

    // 3) Environment override
    if let Ok(name) = std::env::var("ROOMIFY_PROVIDER") {
        if !name.is_empty() {
            return create_provider(&name, &effective_model(config, &name), config);
        }
    }

    // 4) Gemini, the default back-end, when a key is available
    if gemini_api_key(config).is_some() {
        let model = effective_model(config, DEFAULT_PROVIDER);
        return create_provider(DEFAULT_PROVIDER, &model, config);
    }

    // 5) Whatever chat provider the environment offers
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RenderError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No image provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, or ROOMIFY_PROVIDER with that provider's API key.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(ChatImageProvider::new(llm_provider, "auto")))
}

/// Instantiate a named provider with the given model.
fn create_provider(
    name: &str,
    model: &str,
    config: &RenderConfig,
) -> Result<Arc<dyn ImageProvider>, RenderError> {
    if name.eq_ignore_ascii_case(DEFAULT_PROVIDER) {
        let key = gemini_api_key(config).ok_or_else(|| RenderError::ProviderNotConfigured {
            provider: DEFAULT_PROVIDER.to_string(),
            hint: "Set GEMINI_API_KEY or pass --api-key.".to_string(),
        })?;
        let provider =
            GeminiImageProvider::new(key, config.api_base.as_deref(), config.api_timeout_secs)?;
        return Ok(Arc::new(provider));
    }

    let llm = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        RenderError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(ChatImageProvider::new(llm, name)))
}

fn gemini_api_key(config: &RenderConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .filter(|k| !k.trim().is_empty())
}
