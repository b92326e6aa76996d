//! Image-generation providers behind one narrow interface.
//!
//! The orchestrator hands a [`RenderRequest`] to an [`ImageProvider`] and gets
//! back an optional image reference. The reference reuses [`SourceImage`]
//! because a provider may answer inline (a data-URL) or with a link to fetch,
//! which is exactly the input shape the pipeline already knows how to
//! normalise.
//!
//! Two back-ends ship with the crate:
//!
//! * [`GeminiImageProvider`] — Google's `generateContent` REST endpoint with
//!   image output enabled. This is the default.
//! * [`ChatImageProvider`] — any `edgequake_llm` chat provider. The reply
//!   text is scanned for the first data-URL or http(s) link.
//!
//! Neither retries. A provider that answers but supplies no image returns
//! `Ok(None)`, which the orchestrator reports as "no image produced".

use crate::error::RenderError;
use crate::pipeline::data_url::DataUrl;
use crate::pipeline::input::SourceImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Provider used when nothing else is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Image-capable Gemini model used by default.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Chat model used when another provider is named without a model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-nano";

/// Default model for a provider name.
pub fn default_model_for(provider: &str) -> &'static str {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" => DEFAULT_IMAGE_MODEL,
        "anthropic" => "claude-sonnet-4-20250514",
        "mistral" => "pixtral-12b-2409",
        "ollama" => "llava",
        _ => DEFAULT_CHAT_MODEL,
    }
}

/// Base URL of the Gemini REST API.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Output size of a render, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// The fixed 1024×1024 target every render uses by default.
    pub const SQUARE_1024: Resolution = Resolution {
        width: 1024,
        height: 1024,
    };

    /// Reduced aspect ratio, e.g. `"1:1"` or `"16:9"`.
    pub fn aspect_ratio(&self) -> String {
        let g = gcd(self.width, self.height).max(1);
        format!("{}:{}", self.width / g, self.height / g)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::SQUARE_1024
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Everything a provider needs for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub prompt: String,
    pub model: String,
    pub mime_type: String,
    /// Base64 image bytes, without the data-URL header.
    pub payload: String,
    pub resolution: Resolution,
}

/// An external text-to-image service conditioned on a source image.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Submit one request. `Ok(None)` means the provider answered without an
    /// image.
    async fn submit(&self, request: &RenderRequest) -> Result<Option<SourceImage>, RenderError>;
}

// ── Gemini REST ─────────────────────────────────────────────────────────

/// [`ImageProvider`] calling `models/{model}:generateContent`.
#[derive(Clone)]
pub struct GeminiImageProvider {
    client: Client,
    api_key: String,
    api_base: String,
}

impl fmt::Debug for GeminiImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiImageProvider")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiImageProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, RenderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RenderError::ProviderNotConfigured {
                provider: DEFAULT_PROVIDER.to_string(),
                hint: "Set GEMINI_API_KEY or pass an API key.".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RenderError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            api_base: api_base
                .unwrap_or(DEFAULT_GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }

    fn provider_error(&self, message: impl Into<String>) -> RenderError {
        RenderError::Provider {
            provider: DEFAULT_PROVIDER.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
    #[serde(alias = "file_data")]
    file_data: Option<ResponseFileData>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    #[serde(alias = "mime_type")]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseFileData {
    #[serde(alias = "file_uri")]
    file_uri: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GenerateContentResponse {
    /// First usable image reference across all candidates.
    fn image_reference(&self) -> Option<SourceImage> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|part| {
                if let Some(inline) = &part.inline_data {
                    if !inline.data.is_empty() {
                        let mime = inline.mime_type.as_deref().unwrap_or("image/png");
                        return Some(SourceImage::Inline(DataUrl::from_parts(mime, &inline.data)));
                    }
                }
                part.file_data
                    .as_ref()
                    .and_then(|f| reference_from_str(&f.file_uri))
            })
    }

    fn text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.text.as_deref())
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    fn name(&self) -> &str {
        DEFAULT_PROVIDER
    }

    async fn submit(&self, request: &RenderRequest) -> Result<Option<SourceImage>, RenderError> {
        let start = Instant::now();
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![
                    RequestPart::Text(&request.prompt),
                    RequestPart::InlineData(InlineData {
                        mime_type: &request.mime_type,
                        data: &request.payload,
                    }),
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio: request.resolution.aspect_ratio(),
                },
            },
        };

        info!(
            "Submitting {} ({} bytes base64) to {} model {}",
            request.mime_type,
            request.payload.len(),
            DEFAULT_PROVIDER,
            request.model
        );

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.provider_error(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.provider_error(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|env| env.error.message)
                .unwrap_or(text);
            return Err(self.provider_error(format!("HTTP {status}: {detail}")));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| self.provider_error(format!("unexpected response body: {e}")))?;

        let reference = parsed.image_reference();
        debug!(
            "Provider answered in {:?} ({} candidates)",
            start.elapsed(),
            parsed.candidates.len()
        );
        if reference.is_none() {
            warn!(
                "Provider returned no image{}",
                parsed
                    .text()
                    .map(|t| format!(": {}", truncate(t, 120)))
                    .unwrap_or_default()
            );
        }
        Ok(reference)
    }
}

// ── edgequake-llm chat providers ─────────────────────────────────────────

/// [`ImageProvider`] over any `edgequake_llm` chat provider.
///
/// The prompt and the conditioning image go out as one user message. The
/// reply is expected to contain the rendered image as a data-URL or a link.
pub struct ChatImageProvider {
    inner: Arc<dyn LLMProvider>,
    name: String,
}

impl ChatImageProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }
}

impl fmt::Debug for ChatImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatImageProvider")
            .field("name", &self.name)
            .field("inner", &"<dyn LLMProvider>")
            .finish()
    }
}

#[async_trait]
impl ImageProvider for ChatImageProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &RenderRequest) -> Result<Option<SourceImage>, RenderError> {
        let text = format!(
            "{}\n\nOutput resolution: {}.",
            request.prompt, request.resolution
        );
        let image = ImageData::new(request.payload.clone(), request.mime_type.as_str());
        let messages = vec![ChatMessage::user_with_images(text.as_str(), vec![image])];
        let options = CompletionOptions {
            temperature: Some(0.4),
            ..Default::default()
        };

        info!("Submitting render to chat provider '{}'", self.name);
        let response = self
            .inner
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| RenderError::Provider {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        let reference = extract_image_reference(&response.content);
        if reference.is_none() {
            warn!(
                "Provider '{}' replied without an image: {}",
                self.name,
                truncate(&response.content, 120)
            );
        }
        Ok(reference)
    }
}

static RE_DATA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"data:image/[A-Za-z0-9.+-]+;base64,[A-Za-z0-9+/=]+").unwrap());

static RE_HTTP_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s()<>\[\]"']+"#).unwrap());

/// Sentence punctuation that ends a link in prose but is never part of it.
const TRAILING_PUNCTUATION: [char; 6] = ['.', ',', ';', ':', '!', '?'];

/// Find the first image reference in free text. Inline data wins over links.
pub fn extract_image_reference(text: &str) -> Option<SourceImage> {
    if let Some(m) = RE_DATA_URL.find(text) {
        return Some(SourceImage::Inline(DataUrl::new(m.as_str())));
    }
    RE_HTTP_URL
        .find_iter(text)
        .find_map(|m| {
            reference_from_str(m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        })
}

fn reference_from_str(raw: &str) -> Option<SourceImage> {
    let raw = raw.trim();
    if raw.starts_with("data:") {
        return Some(SourceImage::Inline(DataUrl::new(raw)));
    }
    Url::parse(raw)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(SourceImage::Remote)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_is_reduced() {
        assert_eq!(Resolution::SQUARE_1024.aspect_ratio(), "1:1");
        let wide = Resolution {
            width: 1920,
            height: 1080,
        };
        assert_eq!(wide.aspect_ratio(), "16:9");
        assert_eq!(wide.to_string(), "1920x1080");
    }

    #[test]
    fn request_body_matches_wire_format() {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![
                    RequestPart::Text("render it"),
                    RequestPart::InlineData(InlineData {
                        mime_type: "image/png",
                        data: "Qg==",
                    }),
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio: "1:1".into(),
                },
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "render it");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "Qg==");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    }

    #[test]
    fn response_inline_data_becomes_data_url() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"Here is your render"},
                {"inlineData":{"mimeType":"image/jpeg","data":"/9j/"}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.image_reference(),
            Some(SourceImage::Inline(DataUrl::new("data:image/jpeg;base64,/9j/")))
        );
    }

    #[test]
    fn response_accepts_snake_case_and_file_uri() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[
                {"file_data":{"file_uri":"https://y/out.png"}}
            ]}}]}"#,
        )
        .unwrap();
        match parsed.image_reference() {
            Some(SourceImage::Remote(url)) => assert_eq!(url.as_str(), "https://y/out.png"),
            other => panic!("expected remote reference, got {other:?}"),
        }
    }

    #[test]
    fn response_without_image_has_no_reference() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"I can't draw that."}]}}]}"#,
        )
        .unwrap();
        assert!(parsed.image_reference().is_none());
        assert_eq!(parsed.text(), Some("I can't draw that."));

        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.image_reference().is_none());
    }

    #[test]
    fn extract_prefers_inline_data() {
        let text = "See https://y/out.png or ![render](data:image/png;base64,Qg==)";
        assert_eq!(
            extract_image_reference(text),
            Some(SourceImage::Inline(DataUrl::new("data:image/png;base64,Qg==")))
        );
    }

    #[test]
    fn extract_finds_markdown_link() {
        let text = "Done! ![render](https://cdn.example.com/r/42.png)";
        match extract_image_reference(text) {
            Some(SourceImage::Remote(url)) => {
                assert_eq!(url.as_str(), "https://cdn.example.com/r/42.png")
            }
            other => panic!("expected remote reference, got {other:?}"),
        }
        assert!(extract_image_reference("Sorry, I cannot help with that.").is_none());
    }

    #[test]
    fn extract_drops_sentence_punctuation() {
        let text = "Your render is ready: https://cdn.example.com/r/42.png.";
        match extract_image_reference(text) {
            Some(SourceImage::Remote(url)) => {
                assert_eq!(url.as_str(), "https://cdn.example.com/r/42.png")
            }
            other => panic!("expected remote reference, got {other:?}"),
        }

        let text = "Done (see https://cdn.example.com/r/43.jpg), enjoy!";
        match extract_image_reference(text) {
            Some(SourceImage::Remote(url)) => {
                assert_eq!(url.as_str(), "https://cdn.example.com/r/43.jpg")
            }
            other => panic!("expected remote reference, got {other:?}"),
        }
    }

    #[test]
    fn default_model_depends_on_provider() {
        assert_eq!(default_model_for("gemini"), DEFAULT_IMAGE_MODEL);
        assert_eq!(default_model_for("Gemini"), DEFAULT_IMAGE_MODEL);
        assert_eq!(default_model_for("openai"), DEFAULT_CHAT_MODEL);
        assert_eq!(default_model_for("anthropic"), "claude-sonnet-4-20250514");
        assert_eq!(default_model_for("ollama"), "llava");
    }

    #[test]
    fn gemini_requires_api_key() {
        let err = GeminiImageProvider::new("  ", None, 10).unwrap_err();
        assert!(matches!(err, RenderError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn gemini_endpoint_uses_base_and_model() {
        let p = GeminiImageProvider::new("k", Some("http://127.0.0.1:9/"), 10).unwrap();
        assert_eq!(
            p.endpoint("m"),
            "http://127.0.0.1:9/v1beta/models/m:generateContent"
        );
        assert!(!format!("{p:?}").contains("\"k\""));
    }
}
