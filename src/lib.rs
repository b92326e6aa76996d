//! # roomify-render
//!
//! Turn a 2D floor-plan image into a photorealistic top-down 3D render using
//! an image-generation model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! floor plan (data-URL, http(s) URL or local JPEG/PNG)
//!  │
//!  ├─ 1. Normalise  fetch remote sources and encode them as a data-URL
//!  ├─ 2. Decode     split the data-URL into MIME type and base64 payload
//!  ├─ 3. Submit     fixed prompt + image → provider (1024×1024, Gemini default)
//!  ├─ 4. Interpret  no image reference → RenderResult::NoImageProduced
//!  └─ 5. Normalise  fetch the rendered image if the provider returned a link
//! ```
//!
//! Whatever shape the provider answers in, the caller always gets an inline
//! data-URL back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomify_render::{render_input, RenderConfig, RenderResult};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider resolved from GEMINI_API_KEY / ROOMIFY_PROVIDER
//!     let config = RenderConfig::default();
//!     let output = render_input("plan.png", &config).await?;
//!     match output.result {
//!         RenderResult::Rendered(url) => println!("{url}"),
//!         RenderResult::NoImageProduced => eprintln!("no image produced"),
//!     }
//!     eprintln!("took {}ms", output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `roomify` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! roomify-render = { version = "0.1", default-features = false }
//! ```
//!
//! ## Upload progress
//!
//! [`progress::ProgressProxy`] drives the cosmetic percentage shown while an
//! upload is read. It is a fixed-cadence timer, not a measure of real I/O.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RenderConfig, RenderConfigBuilder};
pub use error::{ErrorKind, RenderError};
pub use output::{RenderOutput, RenderResult, RenderStats};
pub use pipeline::data_url::{Blob, DataUrl};
pub use pipeline::fetch::{Fetcher, HttpFetcher};
pub use pipeline::input::SourceImage;
pub use pipeline::provider::{ImageProvider, RenderRequest, Resolution};
pub use progress::{ProgressConfig, ProgressProxy, ProgressState};
pub use render::{
    render, render_detailed, render_input, render_sync, resolve_provider, InvocationId,
    InvocationTracker, Renderer,
};
pub use stream::{render_stream, RenderStream, RenderTicket};
