//! # page-harvest
//!
//! Visit web pages in a headless browser, pull out every element carrying a
//! `data-cmp-data-layer` analytics payload, and lay the results into a single
//! document: one row (or block) per element with its source URL, a readable
//! rendering of the payload and a snapshot of the element as it rendered.
//!
//! ## Pipeline Overview
//!
//! ```text
//! [URL, URL, …]
//!  │
//!  ├─ 1. Navigate  one shared headless tab, URLs strictly in order
//!  ├─ 2. Overlay   best-effort click on a consent banner
//!  ├─ 3. Harvest   decode + flatten payloads, dedupe, snapshot each target
//!  ├─ 4. Scale     fit the snapshot into the embed bounds
//!  ├─ 5. Compose   append to a spreadsheet (xlsx) or paginated flow (pdf)
//!  └─ 6. Output    one artifact written atomically + per-batch stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use page_harvest::{harvest_urls, HarvestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::default();
//!     let urls = vec!["https://example.com/".to_string()];
//!     let output = harvest_urls(&urls, &config).await?;
//!     println!("{} records → {}", output.stats.records, output.artifact_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `chrome` | on      | [`browser::ChromeSession`] over `headless_chrome` |
//! | `server` | on      | `POST /scrape` HTTP front end (axum) |
//! | `cli`    | on      | The `harvest` binary (clap + anyhow + tracing-subscriber) |
//!
//! Without `chrome`, bring your own [`browser::PageSession`] and call
//! [`run_batch`] directly.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod browser;
pub mod compose;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

#[cfg(feature = "chrome")]
pub use batch::harvest_urls;
pub use batch::{run_batch, validate_urls};
pub use browser::{BoundingBox, CaptureTarget, ContainerRef, DomCandidate, PageSession};
pub use compose::{DocumentComposer, FinishedDocument};
pub use config::{Backend, FlowLayout, HarvestConfig, HarvestConfigBuilder};
pub use error::{BrowserError, FlattenError, HarvestError, PayloadError, SkipReason};
pub use output::{BatchOutput, BatchStats, SkippedElement};
pub use pipeline::flatten::{flatten, format_as_text, FlattenedRecord};
pub use pipeline::payload::{decode_entities, decode_payload};
pub use pipeline::scale::{scale, EmbedBounds, ScaledGeometry};
pub use progress::{HarvestProgressCallback, NoopProgressCallback, ProgressCallback};
