//! Document composition: harvested records → one output document.
//!
//! Both backends implement [`DocumentComposer`], so the batch pipeline never
//! knows which form it is producing. Records are appended strictly in
//! harvest order; nothing is serialised until [`DocumentComposer::finalize`].
//!
//! ```text
//! record ──▶ geometry() ──▶ append() ──▶ … ──▶ finalize() ──▶ bytes
//!            (embed size)   (row/block)         (xlsx / pdf)
//! ```

pub mod flow;
pub mod pdf;
pub mod tabular;

use crate::config::{Backend, HarvestConfig};
use crate::error::HarvestError;
use crate::pipeline::harvest::HarvestedRecord;
use crate::pipeline::scale::ScaledGeometry;

pub use flow::{FlowComposer, FlowCursor};
pub use tabular::TabularComposer;

/// A serialised output document.
#[derive(Debug, Clone)]
pub struct FinishedDocument {
    pub bytes: Vec<u8>,
    /// Page count (always 1 for a spreadsheet).
    pub pages: usize,
}

/// Lays harvested records into an output document.
pub trait DocumentComposer: Send {
    /// Embed size this backend uses for `record`'s snapshot.
    fn geometry(&self, record: &HarvestedRecord) -> ScaledGeometry;

    /// Append one record's projection. `url` is the page it came from.
    fn append(
        &mut self,
        url: &str,
        record: HarvestedRecord,
        geometry: ScaledGeometry,
    ) -> Result<(), HarvestError>;

    /// Number of records appended so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialise everything appended so far.
    fn finalize(self: Box<Self>) -> Result<FinishedDocument, HarvestError>;
}

/// Build the composer selected by `config.backend`.
pub fn for_config(config: &HarvestConfig) -> Box<dyn DocumentComposer> {
    match config.backend {
        Backend::Tabular => Box::new(TabularComposer::new(config.bounds)),
        Backend::Flow => Box::new(FlowComposer::new(config.flow)),
    }
}
