//! Configuration types for a harvest batch.
//!
//! All batch behaviour is controlled through [`HarvestConfig`], built via
//! its [`HarvestConfigBuilder`]. Directories, selectors and size thresholds
//! are threaded through the pipeline from here; nothing reads process-wide
//! state.

use crate::error::HarvestError;
use crate::pipeline::scale::EmbedBounds;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a harvest batch.
///
/// Built via [`HarvestConfig::builder()`] or using [`HarvestConfig::default()`].
///
/// # Example
/// ```rust
/// use page_harvest::{Backend, HarvestConfig};
///
/// let config = HarvestConfig::builder()
///     .backend(Backend::Flow)
///     .output_dir("out")
///     .min_size(120.0, 80.0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct HarvestConfig {
    /// Output document form. Default: [`Backend::Tabular`].
    pub backend: Backend,

    /// Attribute holding the entity-escaped payload. Default: `data-cmp-data-layer`.
    pub payload_attribute: String,

    /// Selector for the semantic container an annotated element may sit in.
    /// Default: `.cmp-teaser`.
    pub container_selector: String,

    /// Close button of the cookie banner, clicked if it shows up.
    /// `None` skips dismissal. Default: `#close-pc-btn-handler`.
    pub overlay_selector: Option<String>,

    /// How long to wait for the overlay button. Default: 5 s.
    pub overlay_timeout: Duration,

    /// Default wait for navigation and element lookups. Default: 30 s.
    pub navigation_timeout: Duration,

    /// Where snapshot PNGs are written. Created if absent. Default: `screenshots`.
    pub screenshot_dir: PathBuf,

    /// Where the composed document is written. Created if absent. Default: `public`.
    pub output_dir: PathBuf,

    /// Embed bounds for the tabular backend.
    pub bounds: EmbedBounds,

    /// Page geometry for the flow backend.
    pub flow: FlowLayout,

    /// Nesting limit for payload flattening. Default: 64.
    pub max_payload_depth: usize,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            payload_attribute: "data-cmp-data-layer".to_string(),
            container_selector: ".cmp-teaser".to_string(),
            overlay_selector: Some("#close-pc-btn-handler".to_string()),
            overlay_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
            screenshot_dir: PathBuf::from("screenshots"),
            output_dir: PathBuf::from("public"),
            bounds: EmbedBounds::default(),
            flow: FlowLayout::default(),
            max_payload_depth: 64,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("backend", &self.backend)
            .field("payload_attribute", &self.payload_attribute)
            .field("container_selector", &self.container_selector)
            .field("overlay_selector", &self.overlay_selector)
            .field("overlay_timeout", &self.overlay_timeout)
            .field("navigation_timeout", &self.navigation_timeout)
            .field("screenshot_dir", &self.screenshot_dir)
            .field("output_dir", &self.output_dir)
            .field("bounds", &self.bounds)
            .field("flow", &self.flow)
            .field("max_payload_depth", &self.max_payload_depth)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn HarvestProgressCallback>"),
            )
            .finish()
    }
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Fixed, well-known location of the composed document.
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(self.backend.artifact_name())
    }
}

/// Builder for [`HarvestConfig`].
#[derive(Debug)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn payload_attribute(mut self, attr: impl Into<String>) -> Self {
        self.config.payload_attribute = attr.into();
        self
    }

    pub fn container_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.container_selector = selector.into();
        self
    }

    pub fn overlay_selector(mut self, selector: Option<String>) -> Self {
        self.config.overlay_selector = selector;
        self
    }

    pub fn overlay_timeout(mut self, timeout: Duration) -> Self {
        self.config.overlay_timeout = timeout;
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout.max(Duration::from_secs(1));
        self
    }

    pub fn screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.screenshot_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn min_size(mut self, width: f64, height: f64) -> Self {
        self.config.bounds.min_width = width.max(1.0);
        self.config.bounds.min_height = height.max(1.0);
        self
    }

    pub fn max_size(mut self, width: f64, height: f64) -> Self {
        self.config.bounds.max_width = width.max(1.0);
        self.config.bounds.max_height = height.max(1.0);
        self
    }

    pub fn flow_layout(mut self, layout: FlowLayout) -> Self {
        self.config.flow = layout;
        self
    }

    pub fn max_payload_depth(mut self, depth: usize) -> Self {
        self.config.max_payload_depth = depth.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let c = &self.config;
        if c.payload_attribute.trim().is_empty() {
            return Err(HarvestError::InvalidConfig(
                "Payload attribute must not be empty".into(),
            ));
        }
        if c.container_selector.trim().is_empty() {
            return Err(HarvestError::InvalidConfig(
                "Container selector must not be empty".into(),
            ));
        }
        let b = &c.bounds;
        if b.min_width > b.max_width || b.min_height > b.max_height {
            return Err(HarvestError::InvalidConfig(format!(
                "Minimum embed size {}x{} exceeds maximum {}x{}",
                b.min_width, b.min_height, b.max_width, b.max_height
            )));
        }
        c.flow.validate()?;
        Ok(self.config)
    }
}

// ── Enums / layout ───────────────────────────────────────────────────────

/// Which document form the batch produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Spreadsheet, one row per record (default).
    #[default]
    Tabular,
    /// Paginated PDF, text on the left and snapshot on the right.
    Flow,
}

impl Backend {
    /// File name of the composed document inside the output directory.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Backend::Tabular => "output.xlsx",
            Backend::Flow => "output.pdf",
        }
    }
}

/// Page geometry for the flow backend, in PDF points (1/72 in).
///
/// Defaults describe an A4 portrait page with a 50 pt margin, a 250 pt
/// text column on the left and snapshots from x = 320 on the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowLayout {
    pub page_width: f64,
    pub page_height: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
    pub text_x: f64,
    pub text_width: f64,
    pub image_x: f64,
    pub image_max_width: f64,
    pub min_row_height: f64,
    pub spacing: f64,
    pub font_size: f64,
    pub line_height: f64,
}

impl Default for FlowLayout {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            top_margin: 50.0,
            bottom_margin: 50.0,
            text_x: 50.0,
            text_width: 250.0,
            image_x: 320.0,
            image_max_width: 225.0,
            min_row_height: 100.0,
            spacing: 20.0,
            font_size: 9.0,
            line_height: 12.0,
        }
    }
}

impl FlowLayout {
    fn validate(&self) -> Result<(), HarvestError> {
        if self.top_margin + self.bottom_margin >= self.page_height {
            return Err(HarvestError::InvalidConfig(
                "Flow margins leave no printable height".into(),
            ));
        }
        if self.image_x + self.image_max_width > self.page_width {
            return Err(HarvestError::InvalidConfig(format!(
                "Image column ({} + {}) overflows page width {}",
                self.image_x, self.image_max_width, self.page_width
            )));
        }
        if self.line_height <= 0.0 || self.font_size <= 0.0 {
            return Err(HarvestError::InvalidConfig(
                "Font size and line height must be positive".into(),
            ));
        }
        Ok(())
    }
}
