//! Streaming render API: emit results as renders complete.
//!
//! A single render takes tens of seconds, so batches are run with up to
//! `config.concurrency` renders in flight. [`render_stream`] yields a
//! [`RenderTicket`] per source as soon as it finishes; tickets may arrive out
//! of order (use `source_index` to match them back).
//!
//! Renders are independent. A failed fetch or provider error for one source
//! is carried in its ticket and never stops the others.

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::output::RenderOutput;
use crate::pipeline::input::SourceImage;
use crate::render::{InvocationId, Renderer};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// Outcome of one render in a batch.
#[derive(Debug)]
pub struct RenderTicket {
    pub invocation: InvocationId,
    /// Position of the source in the input list.
    pub source_index: usize,
    pub result: Result<RenderOutput, RenderError>,
}

/// A boxed stream of render tickets.
pub type RenderStream = Pin<Box<dyn Stream<Item = RenderTicket> + Send>>;

/// Render every source, streaming tickets in completion order.
///
/// # Errors
/// Only setup failures (HTTP client, provider resolution) are returned here;
/// per-source failures are inside the tickets.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use roomify_render::{render_stream, RenderConfig, SourceImage};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sources = vec![SourceImage::parse("https://example.com/plan.png")?];
/// let mut tickets = render_stream(sources, &RenderConfig::default())?;
/// while let Some(ticket) = tickets.next().await {
///     match ticket.result {
///         Ok(out) => println!("{}: {:?}", ticket.source_index, out.result.is_rendered()),
///         Err(e) => eprintln!("{}: {e}", ticket.source_index),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn render_stream(
    sources: Vec<SourceImage>,
    config: &RenderConfig,
) -> Result<RenderStream, RenderError> {
    let renderer = Arc::new(Renderer::from_config(config)?);
    Ok(render_stream_with(renderer, sources, config.concurrency))
}

/// [`render_stream`] over an existing [`Renderer`].
pub fn render_stream_with(
    renderer: Arc<Renderer>,
    sources: Vec<SourceImage>,
    concurrency: usize,
) -> RenderStream {
    info!(
        "Streaming {} renders via {} ({} in flight)",
        sources.len(),
        renderer.provider_name(),
        concurrency
    );

    let s = stream::iter(sources.into_iter().enumerate().map(move |(idx, source)| {
        let renderer = Arc::clone(&renderer);
        async move {
            let (invocation, result) = renderer.render_tracked(source).await;
            RenderTicket {
                invocation,
                source_index: idx,
                result,
            }
        }
    }))
    .buffer_unordered(concurrency.max(1));

    Box::pin(s)
}
