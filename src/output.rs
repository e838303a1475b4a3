//! Result types returned by a completed batch.

use crate::error::SkipReason;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of a successful batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Where the composed document was written.
    pub artifact_path: PathBuf,
    /// File name of the document, as exposed to HTTP clients.
    pub artifact_name: String,
    pub stats: BatchStats,
    /// Every element that produced no record, in harvest order.
    pub skipped: Vec<SkippedElement>,
}

/// Counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_urls: usize,
    /// URLs whose harvest yielded no record at all.
    pub empty_urls: usize,
    /// Records laid into the document.
    pub records: usize,
    /// Elements dropped as duplicates of an earlier `uniqueKey`.
    pub duplicates: usize,
    /// Elements dropped for any other reason.
    pub failed_elements: usize,
    /// Pages in the document (always 1 for the tabular backend).
    pub document_pages: usize,
    pub total_duration_ms: u64,
}

/// An annotated element that did not make it into the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedElement {
    pub url: String,
    pub element_id: String,
    pub reason: SkipReason,
}
