//! Configuration types for floor-plan rendering.
//!
//! Every knob lives in [`RenderConfig`], built via [`RenderConfigBuilder`].
//! The config is read-only once built; it is the only state that concurrent
//! renders share.

use crate::error::RenderError;
use crate::pipeline::provider::{default_model_for, ImageProvider, Resolution};
use crate::progress::ProgressConfig;
use crate::prompts::DEFAULT_RENDER_PROMPT;
use std::fmt;
use std::sync::Arc;

/// Configuration for a render.
///
/// # Example
/// ```rust
/// use roomify_render::RenderConfig;
///
/// let config = RenderConfig::builder()
///     .model("gemini-2.5-flash-image-preview")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RenderConfig {
    /// Prompt sent with every render. Default: [`DEFAULT_RENDER_PROMPT`].
    pub prompt: String,

    /// Provider name, e.g. "gemini", "openai", "ollama".
    /// If None, resolved from the environment.
    pub provider_name: Option<String>,

    /// Model identifier. If None, `ROOMIFY_MODEL` or the provider's default
    /// ([`default_model_for`]).
    pub model: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn ImageProvider>>,

    /// API key for the Gemini back-end. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Override the Gemini API base URL (proxies, tests).
    pub api_base: Option<String>,

    /// Output resolution requested from the provider. Default: 1024×1024.
    pub resolution: Resolution,

    /// Timeout for fetching remote images, in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Timeout for the provider call, in seconds. Default: 120.
    ///
    /// Image generation is slow; 20–40 s per render is normal.
    pub api_timeout_secs: u64,

    /// Maximum renders in flight for [`crate::stream::render_stream`]. Default: 4.
    pub concurrency: usize,

    /// Cadence of the cosmetic progress indicator.
    pub progress: ProgressConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_RENDER_PROMPT.to_string(),
            provider_name: None,
            model: None,
            provider: None,
            api_key: None,
            api_base: None,
            resolution: Resolution::SQUARE_1024,
            download_timeout_secs: 60,
            api_timeout_secs: 120,
            concurrency: 4,
            progress: ProgressConfig::default(),
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("prompt_len", &self.prompt.len())
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("resolution", &self.resolution)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("progress", &self.progress)
            .finish()
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured model, or `provider`'s default.
    pub fn model_or_default(&self, provider: &str) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| default_model_for(provider))
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = prompt.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = Some(base.into());
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.config.resolution = resolution;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress(mut self, progress: ProgressConfig) -> Self {
        self.config.progress = progress;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, RenderError> {
        let c = &self.config;
        if c.prompt.trim().is_empty() {
            return Err(RenderError::InvalidConfig("Prompt must not be empty".into()));
        }
        if c.resolution.width == 0 || c.resolution.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "Resolution must be non-zero, got {}",
                c.resolution
            )));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(RenderError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        if c.progress.interval_ms == 0 {
            return Err(RenderError::InvalidConfig(
                "Progress interval must be ≥ 1 ms".into(),
            ));
        }
        if c.progress.step == 0 {
            return Err(RenderError::InvalidConfig(
                "Progress step must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_render_settings() {
        let config = RenderConfig::default();
        assert_eq!(config.resolution, Resolution::SQUARE_1024);
        assert_eq!(
            config.model_or_default("gemini"),
            crate::pipeline::provider::DEFAULT_IMAGE_MODEL
        );
        assert_eq!(config.model_or_default("openai"), "gpt-4.1-nano");
        assert_eq!(config.prompt, DEFAULT_RENDER_PROMPT);
    }

    #[test]
    fn builder_rejects_empty_prompt() {
        let err = RenderConfig::builder().prompt("   ").build().unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_resolution() {
        let err = RenderConfig::builder()
            .resolution(Resolution {
                width: 0,
                height: 1024,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("0x1024"));
    }

    #[test]
    fn builder_rejects_zero_progress_interval() {
        let err = RenderConfig::builder()
            .progress(ProgressConfig {
                interval_ms: 0,
                ..ProgressConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn builder_clamps_concurrency() {
        let config = RenderConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = RenderConfig::builder().api_key("secret-key").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
