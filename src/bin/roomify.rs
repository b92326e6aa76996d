//! CLI binary for roomify-render.
//!
//! A thin shim over the library crate that maps CLI flags to `RenderConfig`,
//! shows upload and render progress, and prints the rendered data-URL.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use roomify_render::pipeline::data_url::{self, DataUrl};
use roomify_render::pipeline::input::{self as source_input, SourceImage};
use roomify_render::progress::IntervalTicker;
use roomify_render::{
    Fetcher, HttpFetcher, ProgressConfig, ProgressProxy, RenderConfig, RenderOutput, RenderResult,
    Renderer, Resolution,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn upload_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
    );
    bar.set_prefix("Uploading");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn render_spinner(provider: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix("Rendering");
    bar.set_message(format!("via {provider}…"));
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render a local floor plan, data-URL on stdout
  roomify plan.png

  # Save the rendered image to a file
  roomify plan.jpg -o plan-3d.png

  # Render a remote floor plan
  roomify https://example.com/plans/ground-floor.png

  # Structured output with timings
  roomify --json plan.png > render.json

  # Just encode the input as a data-URL (no provider call)
  roomify --encode-only plan.png

  # Use a chat provider from edgequake-llm instead of Gemini
  roomify --provider openai --model gpt-4.1 plan.png

INPUT:
  A local .jpg/.jpeg/.png file, an http(s) URL, or a data:<mime>;base64,... URL.
  Other local file types are rejected before anything is read.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  ROOMIFY_PROVIDER        Override provider (gemini, openai, anthropic, ollama, …)
  ROOMIFY_MODEL           Override model ID
  ROOMIFY_API_BASE        Override the Gemini API base URL
  RUST_LOG                Override log filter (e.g. roomify_render=debug)
"#;

/// Render 2D floor plans as photorealistic top-down 3D images.
#[derive(Parser, Debug)]
#[command(
    name = "roomify",
    version,
    about = "Render 2D floor plans as photorealistic top-down 3D images",
    long_about = "Send a 2D floor-plan image (local file, URL or data-URL) to an \
image-generation model and print the rendered top-down 3D view as a data-URL. \
Uses Google Gemini by default; any edgequake-llm chat provider can be selected instead.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local JPEG/PNG path, HTTP/HTTPS URL, or data-URL.
    input: String,

    /// Write the rendered image bytes to this file instead of printing the data-URL.
    #[arg(short, long, env = "ROOMIFY_OUTPUT")]
    output: Option<PathBuf>,

    /// Image model ID. Default: gemini-2.5-flash-image-preview.
    #[arg(long, env = "ROOMIFY_MODEL")]
    model: Option<String>,

    /// Provider: gemini, or any edgequake-llm chat provider.
    #[arg(long, env = "ROOMIFY_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini API base URL.
    #[arg(long, env = "ROOMIFY_API_BASE")]
    api_base: Option<String>,

    /// Path to a text file containing a custom render prompt.
    #[arg(long, env = "ROOMIFY_PROMPT")]
    prompt: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(long, env = "ROOMIFY_WIDTH", default_value_t = 1024)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, env = "ROOMIFY_HEIGHT", default_value_t = 1024)]
    height: u32,

    /// Output structured JSON (RenderOutput) instead of the bare data-URL.
    #[arg(long, env = "ROOMIFY_JSON")]
    json: bool,

    /// Print the input as a data-URL and exit without rendering.
    #[arg(long)]
    encode_only: bool,

    /// Disable progress bars.
    #[arg(long, env = "ROOMIFY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ROOMIFY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ROOMIFY_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ROOMIFY_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Provider call timeout in seconds.
    #[arg(long, env = "ROOMIFY_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bars give all the feedback that matters; library INFO logs would
    // only tear them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli).await?;

    // ── Resolve input ────────────────────────────────────────────────────
    let source = load_source(&cli.input, &config.progress, show_progress).await?;

    // ── Encode-only mode ─────────────────────────────────────────────────
    if cli.encode_only {
        let url = match source {
            SourceImage::Inline(url) => url,
            SourceImage::Remote(url) => {
                let blob = HttpFetcher::new(config.download_timeout_secs)?
                    .fetch(&url)
                    .await
                    .with_context(|| format!("Failed to download {url}"))?;
                data_url::encode_blob(&blob)
            }
        };
        return emit_image(&cli, &url);
    }

    // ── Render ───────────────────────────────────────────────────────────
    let renderer = Renderer::from_config(&config).context("Failed to set up the renderer")?;
    let spinner = show_progress.then(|| render_spinner(renderer.provider_name()));
    let result = renderer.render_detailed(source).await;
    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
    }
    let output = result.context("Render failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    match output.result {
        RenderResult::Rendered(ref url) => {
            emit_image(&cli, url)?;
            if !cli.quiet {
                print_summary(&output);
            }
        }
        RenderResult::NoImageProduced => {
            if !cli.quiet {
                eprintln!(
                    "{} {}",
                    cyan("⚠"),
                    bold("The provider answered without producing an image.")
                );
            }
        }
    }

    Ok(())
}

/// Turn the INPUT argument into a source image.
///
/// Local files are read under the upload progress bar.
async fn load_source(
    input: &str,
    progress: &ProgressConfig,
    show_progress: bool,
) -> Result<SourceImage> {
    if data_url::is_data_url(input) || source_input::is_url(input) {
        return SourceImage::parse(input).context("Invalid input");
    }

    let path = Path::new(input);
    if !path.exists() {
        bail!("Input '{input}' is not a file, an http(s) URL or a data-URL");
    }
    // Reject wrong file types before the bar starts.
    source_input::check_file_type(path)?;

    if !show_progress {
        return SourceImage::from_file(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let proxy = ProgressProxy::new(IntervalTicker::new(progress.interval()), *progress);
    let mut updates = proxy.subscribe();
    let bar = upload_bar();
    let bar_task = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let state = *updates.borrow_and_update();
                bar.set_position(u64::from(state.percent));
                if state.done {
                    bar.set_message("ready");
                }
            }
        })
    };

    let source = proxy.run(SourceImage::from_file(path)).await;
    let _ = bar_task.await;
    bar.finish_and_clear();

    source.with_context(|| format!("Failed to read {}", path.display()))
}

/// Print the data-URL, or write the decoded image to `--output`.
fn emit_image(cli: &Cli, url: &DataUrl) -> Result<()> {
    if let Some(ref path) = cli.output {
        let decoded = data_url::decode(url).context("Rendered image is not a valid data-URL")?;
        let bytes = STANDARD
            .decode(decoded.payload)
            .context("Rendered image payload is not valid base64")?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!(
                "{} {} ({}, {} bytes)",
                green("✔"),
                bold(&path.display().to_string()),
                decoded.mime_type,
                bytes.len()
            );
        }
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(url.as_str().as_bytes())
        .context("Failed to write to stdout")?;
    handle.write_all(b"\n").ok();
    Ok(())
}

fn print_summary(output: &RenderOutput) {
    let stats = &output.stats;
    eprintln!(
        "{} rendered via {} {}",
        green("✔"),
        bold(&stats.provider),
        dim(&format!("({})", stats.model)),
    );
    eprintln!(
        "   {}  {}",
        dim(&format!(
            "provider {:.1}s  /  total {:.1}s",
            stats.provider_duration_ms as f64 / 1000.0,
            stats.total_duration_ms as f64 / 1000.0
        )),
        dim(&format!("{} fetches", stats.fetches)),
    );
}

/// Map CLI args to `RenderConfig`.
async fn build_config(cli: &Cli) -> Result<RenderConfig> {
    let mut builder = RenderConfig::builder()
        .resolution(Resolution {
            width: cli.width,
            height: cli.height,
        })
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref base) = cli.api_base {
        builder = builder.api_base(base);
    }

    builder.build().context("Invalid configuration")
}
