//! Element harvesting: annotated DOM nodes → deduplicated records.
//!
//! A page pass runs in two phases:
//!
//! 1. [`select_records`] — pure. Decodes each candidate's payload, works
//!    out its `uniqueKey` and drops everything that cannot become a record.
//!    First occurrence of a key wins.
//! 2. [`harvest_page`] — photographs each surviving target through the
//!    [`PageSession`] in DOM order and writes the PNG next to its siblings.
//!
//! Every element-level failure becomes a [`SkippedElement`]. A failed DOM
//! query, a failed capture of a still-attached element, or a failed file
//! write aborts the batch.

use crate::browser::{CaptureTarget, DomCandidate, PageSession};
use crate::config::{Backend, HarvestConfig};
use crate::error::{HarvestError, SkipReason};
use crate::output::SkippedElement;
use crate::pipeline::flatten::{flatten, FlattenedRecord};
use crate::pipeline::payload::decode_payload;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid regex"));

const MAX_FILE_STEM: usize = 120;
const KEY_TAG_BYTES: usize = 4;

/// Whether geometry and snapshot come from the element or its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    None,
    Container,
}

/// A captured raster image.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub png: Vec<u8>,
}

/// A record that passed selection but has not been photographed yet.
#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub id: String,
    pub container_kind: ContainerKind,
    pub unique_key: String,
    pub payload: Value,
    pub flattened: FlattenedRecord,
    pub natural_width: f64,
    pub natural_height: f64,
    /// 1-based position among the page's distinct records.
    pub element_index: usize,
    pub target: CaptureTarget,
}

/// One deduplicated annotated region on one page.
#[derive(Debug, Clone)]
pub struct HarvestedRecord {
    pub id: String,
    pub container_kind: ContainerKind,
    pub unique_key: String,
    pub payload: Value,
    pub flattened: FlattenedRecord,
    pub natural_width: f64,
    pub natural_height: f64,
    pub element_index: usize,
    pub snapshot: Snapshot,
}

impl HarvestedRecord {
    fn from_pending(pending: PendingRecord, snapshot: Snapshot) -> Self {
        Self {
            id: pending.id,
            container_kind: pending.container_kind,
            unique_key: pending.unique_key,
            payload: pending.payload,
            flattened: pending.flattened,
            natural_width: pending.natural_width,
            natural_height: pending.natural_height,
            element_index: pending.element_index,
            snapshot,
        }
    }
}

/// Everything one page pass produced.
#[derive(Debug, Default)]
pub struct PageHarvest {
    pub records: Vec<HarvestedRecord>,
    pub skipped: Vec<SkippedElement>,
}

/// Records surviving selection, plus what was dropped on the way.
#[derive(Debug, Default)]
pub struct Selection {
    pub pending: Vec<PendingRecord>,
    pub skipped: Vec<SkippedElement>,
}

/// Deduplication key: the id alone, or the id joined to the container's
/// own raw payload attribute.
pub fn unique_key(id: &str, container: Option<&str>) -> String {
    match container {
        Some(raw) => format!("{id}-{raw}"),
        None => id.to_string(),
    }
}

/// Decode, key and deduplicate the candidates of one page.
pub fn select_records(url: &str, candidates: Vec<DomCandidate>, max_depth: usize) -> Selection {
    let mut selection = Selection::default();
    let mut seen: HashSet<String> = HashSet::new();

    for candidate in candidates {
        let skip = |reason: SkipReason| SkippedElement {
            url: url.to_string(),
            element_id: candidate.id.clone(),
            reason,
        };

        if candidate.id.is_empty() {
            selection.skipped.push(skip(SkipReason::MissingId));
            continue;
        }

        let payload = match decode_payload(&candidate.raw_payload) {
            Ok(v) => v,
            Err(e) => {
                selection.skipped.push(skip(SkipReason::Decode {
                    detail: e.to_string(),
                }));
                continue;
            }
        };

        let key = unique_key(
            &candidate.id,
            candidate.container.as_ref().map(|c| c.raw_payload.as_str()),
        );
        if !seen.insert(key.clone()) {
            selection
                .skipped
                .push(skip(SkipReason::Duplicate { unique_key: key }));
            continue;
        }

        let flattened = match flatten("", &payload, max_depth) {
            Ok(f) => f,
            Err(_) => {
                selection
                    .skipped
                    .push(skip(SkipReason::CyclicPayload { max_depth }));
                continue;
            }
        };

        if candidate.bounds.is_empty() {
            selection.skipped.push(skip(SkipReason::EmptyGeometry {
                width: candidate.bounds.width,
                height: candidate.bounds.height,
            }));
            continue;
        }

        let element_index = selection.pending.len() + 1;
        selection.pending.push(PendingRecord {
            id: candidate.id,
            container_kind: if candidate.container.is_some() {
                ContainerKind::Container
            } else {
                ContainerKind::None
            },
            unique_key: key,
            payload,
            flattened,
            natural_width: candidate.bounds.width,
            natural_height: candidate.bounds.height,
            element_index,
            target: candidate.target,
        });
    }

    selection
}

/// Deterministic snapshot file names for one batch.
///
/// The tabular backend names files after the record's `uniqueKey`; the flow
/// backend numbers them by position across the whole batch.
#[derive(Debug)]
pub struct SnapshotNamer {
    backend: Backend,
    dir: PathBuf,
    position: usize,
}

impl SnapshotNamer {
    pub fn new(backend: Backend, dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            dir: dir.into(),
            position: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for the next captured record.
    pub fn next_path(&mut self, unique_key: &str) -> PathBuf {
        self.position += 1;
        let stem = match self.backend {
            Backend::Tabular => sanitize_file_stem(unique_key),
            Backend::Flow => format!("element_{}", self.position),
        };
        self.dir.join(format!("{stem}.png"))
    }
}

/// Reduce an arbitrary key to a portable file stem.
///
/// A key that is already portable is used as is. Anything rewritten or
/// truncated gets a short SHA-256 tag of the original key, so `a.b` and
/// `a_b` land in different files.
pub fn sanitize_file_stem(key: &str) -> String {
    let cleaned = UNSAFE_FILE_CHARS.replace_all(key, "_");
    let trimmed = cleaned.trim_matches('_');
    if !trimmed.is_empty() && trimmed == key && trimmed.chars().count() <= MAX_FILE_STEM {
        return trimmed.to_string();
    }

    let base = if trimmed.is_empty() { "snapshot" } else { trimmed };
    let tag: String = Sha256::digest(key.as_bytes())
        .iter()
        .take(KEY_TAG_BYTES)
        .map(|b| format!("{b:02x}"))
        .collect();
    let prefix: String = base.chars().take(MAX_FILE_STEM - tag.len() - 1).collect();
    format!("{prefix}_{tag}")
}

/// Harvest one already-navigated page.
pub async fn harvest_page<S>(
    session: &mut S,
    url: &str,
    config: &HarvestConfig,
    namer: &mut SnapshotNamer,
) -> Result<PageHarvest, HarvestError>
where
    S: PageSession + ?Sized,
{
    let candidates = session
        .query_annotated(&config.payload_attribute, &config.container_selector)
        .await
        .map_err(|e| HarvestError::Query {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
    debug!("{} candidate elements on {}", candidates.len(), url);

    let Selection { pending, skipped } = select_records(url, candidates, config.max_payload_depth);
    let mut harvest = PageHarvest {
        records: Vec::with_capacity(pending.len()),
        skipped,
    };

    for record in pending {
        let png = match session.screenshot(&record.target).await {
            Ok(Some(png)) => png,
            Ok(None) => {
                harvest.skipped.push(SkippedElement {
                    url: url.to_string(),
                    element_id: record.id,
                    reason: SkipReason::StaleHandle,
                });
                continue;
            }
            Err(e) => {
                return Err(HarvestError::Capture {
                    url: url.to_string(),
                    key: record.unique_key,
                    detail: e.to_string(),
                })
            }
        };

        let path = namer.next_path(&record.unique_key);
        tokio::fs::write(&path, &png)
            .await
            .map_err(|e| HarvestError::ArtifactWrite {
                path: path.clone(),
                source: e,
            })?;
        debug!("Snapshot {} → {}", record.unique_key, path.display());

        harvest
            .records
            .push(HarvestedRecord::from_pending(record, Snapshot { path, png }));
    }

    for s in harvest.skipped.iter().filter(|s| !s.reason.is_duplicate()) {
        warn!("Skipped element '{}' on {}: {}", s.element_id, url, s.reason);
    }
    info!(
        "Harvested {} records from {} ({} skipped)",
        harvest.records.len(),
        url,
        harvest.skipped.len()
    );
    Ok(harvest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BoundingBox, ContainerRef};
    use crate::error::BrowserError;

    const URL: &str = "https://example.com/page";

    fn candidate(id: &str, raw: &str, container: Option<&str>, w: f64, h: f64) -> DomCandidate {
        DomCandidate {
            id: id.to_string(),
            raw_payload: raw.to_string(),
            container: container.map(|c| ContainerRef {
                raw_payload: c.to_string(),
            }),
            target: CaptureTarget {
                selector: format!("#{id}"),
            },
            bounds: BoundingBox {
                width: w,
                height: h,
            },
        }
    }

    const PAYLOAD: &str = "{&quot;title&quot;:&quot;Hello&quot;}";

    #[test]
    fn key_without_container_is_the_id() {
        assert_eq!(unique_key("hero", None), "hero");
        assert_eq!(unique_key("hero", Some("{\"t\":1}")), "hero-{\"t\":1}");
    }

    #[test]
    fn same_id_same_container_yields_one_record() {
        let sel = select_records(
            URL,
            vec![
                candidate("cta", PAYLOAD, Some("C1"), 300.0, 200.0),
                candidate("cta", PAYLOAD, Some("C1"), 300.0, 200.0),
            ],
            64,
        );
        assert_eq!(sel.pending.len(), 1);
        assert_eq!(sel.skipped.len(), 1);
        assert!(sel.skipped[0].reason.is_duplicate());
        assert_eq!(sel.pending[0].container_kind, ContainerKind::Container);
        assert_eq!(sel.pending[0].unique_key, "cta-C1");
    }

    #[test]
    fn same_id_different_containers_are_distinct() {
        let sel = select_records(
            URL,
            vec![
                candidate("cta", PAYLOAD, Some("C1"), 300.0, 200.0),
                candidate("cta", PAYLOAD, Some("C2"), 300.0, 200.0),
            ],
            64,
        );
        assert_eq!(sel.pending.len(), 2);
        assert_eq!(sel.pending[1].element_index, 2);
    }

    #[test]
    fn decode_failure_is_skipped_and_later_elements_survive() {
        let sel = select_records(
            URL,
            vec![
                candidate("bad", "{&quot;oops", None, 10.0, 10.0),
                candidate("good", PAYLOAD, None, 10.0, 10.0),
            ],
            64,
        );
        assert_eq!(sel.pending.len(), 1);
        assert_eq!(sel.pending[0].id, "good");
        assert_eq!(sel.pending[0].element_index, 1);
        assert!(matches!(sel.skipped[0].reason, SkipReason::Decode { .. }));
        assert_eq!(sel.skipped[0].element_id, "bad");
    }

    #[test]
    fn missing_id_and_empty_geometry_are_skipped() {
        let sel = select_records(
            URL,
            vec![
                candidate("", PAYLOAD, None, 10.0, 10.0),
                candidate("flat", PAYLOAD, None, 0.0, 10.0),
            ],
            64,
        );
        assert!(sel.pending.is_empty());
        assert_eq!(sel.skipped[0].reason, SkipReason::MissingId);
        assert!(matches!(
            sel.skipped[1].reason,
            SkipReason::EmptyGeometry { .. }
        ));
    }

    #[test]
    fn deep_payload_is_skipped_as_cyclic() {
        let deep = "{&quot;a&quot;:{&quot;b&quot;:{&quot;c&quot;:1}}}";
        let sel = select_records(URL, vec![candidate("d", deep, None, 10.0, 10.0)], 1);
        assert!(sel.pending.is_empty());
        assert_eq!(
            sel.skipped[0].reason,
            SkipReason::CyclicPayload { max_depth: 1 }
        );
    }

    #[test]
    fn tabular_snapshots_are_named_by_key() {
        let mut namer = SnapshotNamer::new(Backend::Tabular, "shots");
        assert_eq!(namer.next_path("hero"), PathBuf::from("shots/hero.png"));
        assert_eq!(
            namer.next_path("cta-{\"x\":1}"),
            PathBuf::from("shots/cta-_x_1_9c48f043.png")
        );
    }

    #[test]
    fn flow_snapshots_are_numbered_across_the_batch() {
        let mut namer = SnapshotNamer::new(Backend::Flow, "shots");
        assert_eq!(namer.next_path("a"), PathBuf::from("shots/element_1.png"));
        assert_eq!(namer.next_path("a"), PathBuf::from("shots/element_2.png"));
    }

    #[test]
    fn sanitize_handles_degenerate_keys() {
        assert_eq!(sanitize_file_stem("///"), "snapshot_732c4e97");
        assert_eq!(sanitize_file_stem(&"x".repeat(500)).len(), MAX_FILE_STEM);
    }

    #[test]
    fn sanitize_keeps_distinct_keys_apart() {
        assert_eq!(sanitize_file_stem("a_b"), "a_b");
        assert_eq!(sanitize_file_stem("a.b"), "a_b_2e7336dc");

        let long_a = format!("{}A", "k".repeat(130));
        let long_b = format!("{}B", "k".repeat(130));
        assert_ne!(sanitize_file_stem(&long_a), sanitize_file_stem(&long_b));
        assert!(sanitize_file_stem(&long_a).len() <= MAX_FILE_STEM);
    }

    struct FailingCamera;

    #[async_trait::async_trait]
    impl PageSession for FailingCamera {
        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn dismiss_overlay(
            &mut self,
            _selector: &str,
            _timeout: std::time::Duration,
        ) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn query_annotated(
            &mut self,
            _attribute: &str,
            _container_selector: &str,
        ) -> Result<Vec<DomCandidate>, BrowserError> {
            Ok(vec![candidate("hero", PAYLOAD, None, 50.0, 50.0)])
        }

        async fn screenshot(&mut self, _target: &CaptureTarget) -> Result<Option<Vec<u8>>, BrowserError> {
            Err(BrowserError::new("Page.captureScreenshot timed out"))
        }
    }

    #[tokio::test]
    async fn capture_failure_on_attached_element_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarvestConfig::builder()
            .screenshot_dir(dir.path())
            .build()
            .unwrap();
        let mut namer = SnapshotNamer::new(Backend::Tabular, dir.path());

        let err = harvest_page(&mut FailingCamera, URL, &config, &mut namer)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Capture { ref key, .. } if key == "hero"));
    }
}
