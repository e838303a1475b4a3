//! CLI binary for page-harvest.
//!
//! A thin shim over the library crate: `run` maps flags onto
//! `HarvestConfig` and drives one batch; `serve` starts the HTTP front end.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use page_harvest::{
    harvest_urls, Backend, HarvestConfig, HarvestProgressCallback, ProgressCallback, SkipReason,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar across the batch's URLs, with a log line per URL.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} URLs  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Harvesting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl HarvestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_urls: usize) {
        self.bar.set_length(total_urls as u64);
    }

    fn on_url_start(&self, _url_index: usize, _total_urls: usize, url: &str) {
        self.bar.set_message(url.to_string());
    }

    fn on_element_skipped(&self, _url: &str, element_id: &str, reason: &SkipReason) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        if !reason.is_duplicate() {
            self.bar
                .println(format!("  {} {}  {}", yellow("⚠"), element_id, dim(&reason.to_string())));
        }
    }

    fn on_url_complete(&self, url_index: usize, total_urls: usize, records: usize) {
        self.bar.println(format!(
            "  {} URL {:>3}/{:<3}  {}",
            green("✓"),
            url_index,
            total_urls,
            dim(&format!("{records} records")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_urls: usize, total_records: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} records from {} URLs  {}",
            green("✔"),
            bold(&total_records.to_string()),
            total_urls,
            dim(&format!("({} skipped)", self.skipped.load(Ordering::SeqCst))),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Harvest two pages into public/output.xlsx
  harvest run https://example.com/ https://example.com/offers

  # Paginated PDF instead of a spreadsheet
  harvest run --backend flow https://example.com/

  # JSON summary (skipped elements included)
  harvest run --json https://example.com/ > summary.json

  # HTTP service: POST /scrape {"urls": [...]}
  PORT=8080 harvest serve

ENVIRONMENT VARIABLES:
  PORT                    Port for `serve` when --bind is not given (default 3000)
  HARVEST_BACKEND         tabular | flow
  HARVEST_OUTPUT_DIR      Directory for output.xlsx / output.pdf
  HARVEST_SCREENSHOT_DIR  Directory for per-element PNGs
  RUST_LOG                Overrides the log filter
"#;

/// Harvest annotated page elements into a spreadsheet or PDF.
#[derive(Parser, Debug)]
#[command(
    name = "harvest",
    version,
    about = "Harvest annotated page elements into a spreadsheet or PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "HARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "HARVEST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest one batch of URLs and write the document.
    Run(RunArgs),
    /// Serve `POST /scrape` and the output directory over HTTP.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Page URLs, visited in order.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Output JSON (BatchOutput) instead of a text summary.
    #[arg(long, env = "HARVEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HARVEST_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    harvest: HarvestArgs,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on. Defaults to 127.0.0.1:$PORT.
    #[arg(long, env = "HARVEST_BIND")]
    bind: Option<SocketAddr>,

    /// Port used when --bind is not given.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    #[command(flatten)]
    harvest: HarvestArgs,
}

/// Flags shared by `run` and `serve`.
#[derive(Args, Debug)]
struct HarvestArgs {
    /// Document form: tabular (xlsx) or flow (pdf).
    #[arg(long, env = "HARVEST_BACKEND", value_enum, default_value = "tabular")]
    backend: BackendArg,

    /// Directory the document is written to.
    #[arg(long, env = "HARVEST_OUTPUT_DIR", default_value = "public")]
    output_dir: PathBuf,

    /// Directory for per-element PNG snapshots.
    #[arg(long, env = "HARVEST_SCREENSHOT_DIR", default_value = "screenshots")]
    screenshot_dir: PathBuf,

    /// Attribute carrying the JSON payload.
    #[arg(long, env = "HARVEST_ATTRIBUTE", default_value = "data-cmp-data-layer")]
    attribute: String,

    /// Ancestor selector whose region replaces the element's own.
    #[arg(long, env = "HARVEST_CONTAINER", default_value = ".cmp-teaser")]
    container: String,

    /// Overlay close button clicked after each navigation.
    #[arg(long, env = "HARVEST_OVERLAY", default_value = "#close-pc-btn-handler")]
    overlay: String,

    /// Skip overlay dismissal entirely.
    #[arg(long)]
    no_overlay: bool,

    /// Seconds to wait for the overlay.
    #[arg(long, env = "HARVEST_OVERLAY_TIMEOUT", default_value_t = 5)]
    overlay_timeout: u64,

    /// Seconds to wait for navigation and element lookups.
    #[arg(long, env = "HARVEST_NAVIGATION_TIMEOUT", default_value_t = 30)]
    navigation_timeout: u64,

    /// Minimum embed width in pixels.
    #[arg(long, env = "HARVEST_MIN_WIDTH", default_value_t = 100.0)]
    min_width: f64,

    /// Minimum embed height in pixels.
    #[arg(long, env = "HARVEST_MIN_HEIGHT", default_value_t = 100.0)]
    min_height: f64,

    /// Maximum embed width in pixels.
    #[arg(long, env = "HARVEST_MAX_WIDTH", default_value_t = 400.0)]
    max_width: f64,

    /// Maximum embed height in pixels.
    #[arg(long, env = "HARVEST_MAX_HEIGHT", default_value_t = 300.0)]
    max_height: f64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Tabular,
    Flow,
}

impl From<BackendArg> for Backend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Tabular => Backend::Tabular,
            BackendArg::Flow => Backend::Flow,
        }
    }
}

fn build_config(args: &HarvestArgs, progress: Option<ProgressCallback>) -> Result<HarvestConfig> {
    let mut builder = HarvestConfig::builder()
        .backend(args.backend.into())
        .output_dir(&args.output_dir)
        .screenshot_dir(&args.screenshot_dir)
        .payload_attribute(&args.attribute)
        .container_selector(&args.container)
        .overlay_selector((!args.no_overlay).then(|| args.overlay.clone()))
        .overlay_timeout(Duration::from_secs(args.overlay_timeout))
        .navigation_timeout(Duration::from_secs(args.navigation_timeout))
        .min_size(args.min_width, args.min_height)
        .max_size(args.max_width, args.max_height);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are hidden behind the progress bar on `run`.
    let show_progress = match &cli.command {
        Command::Run(args) => !cli.quiet && !args.no_progress && !args.json,
        Command::Serve(_) => false,
    };
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

    match cli.command {
        Command::Run(args) => {
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn HarvestProgressCallback>)
            } else {
                None
            };
            let config = build_config(&args.harvest, progress)?;

            let output = harvest_urls(&args.urls, &config)
                .await
                .context("Harvest failed")?;

            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialize output")?
                );
            } else if !cli.quiet {
                let s = &output.stats;
                println!("Document:   {}", output.artifact_path.display());
                println!("Records:    {}", s.records);
                println!("Pages:      {}", s.document_pages);
                println!("Duplicates: {}", s.duplicates);
                println!("Skipped:    {}", s.failed_elements);
                println!("Empty URLs: {}", s.empty_urls);
                println!("Duration:   {:.1}s", s.total_duration_ms as f64 / 1000.0);
            }
        }
        Command::Serve(args) => {
            let config = build_config(&args.harvest, None)?;
            let addr = args
                .bind
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], args.port)));
            page_harvest::server::serve(addr, config)
                .await
                .context("HTTP server failed")?;
        }
    }

    Ok(())
}
