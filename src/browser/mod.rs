//! Browser collaborator: the live page the harvester reads from.
//!
//! The pipeline only ever talks to a [`PageSession`]. One session is reused
//! for every URL of a batch, strictly sequentially, because DOM resolution
//! and snapshot capture share the same live page state.
//!
//! [`ChromeSession`] (feature `chrome`) drives headless Chrome over CDP.
//! Tests substitute an in-memory implementation.

#[cfg(feature = "chrome")]
mod chrome;

#[cfg(feature = "chrome")]
pub use chrome::ChromeSession;

use crate::error::BrowserError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rendered size of an element, from `getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Handle to the node a snapshot should be taken of: either the annotated
/// element itself or its semantic container.
///
/// `selector` must resolve to exactly that node for as long as it stays
/// attached to the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureTarget {
    pub selector: String,
}

/// The nearest ancestor matching the container selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRef {
    /// The container's own payload attribute, verbatim. Empty when the
    /// container carries none.
    pub raw_payload: String,
}

/// One element carrying the payload attribute, as found on the live page.
///
/// `bounds` and `target` already refer to the container when one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomCandidate {
    pub id: String,
    pub raw_payload: String,
    pub container: Option<ContainerRef>,
    pub target: CaptureTarget,
    pub bounds: BoundingBox,
}

/// A navigable page that can be queried and photographed.
#[async_trait]
pub trait PageSession: Send {
    /// Load `url` and wait for navigation to settle.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Wait up to `timeout` for `selector` and click it. Callers ignore the
    /// result; overlays are dismissed on a best-effort basis.
    async fn dismiss_overlay(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Every element carrying `attribute`, in DOM order, each resolved
    /// against its closest `container_selector` ancestor.
    async fn query_annotated(
        &mut self,
        attribute: &str,
        container_selector: &str,
    ) -> Result<Vec<DomCandidate>, BrowserError>;

    /// PNG snapshot of `target`. `Ok(None)` means the node is no longer in
    /// the live DOM.
    async fn screenshot(&mut self, target: &CaptureTarget) -> Result<Option<Vec<u8>>, BrowserError>;
}
