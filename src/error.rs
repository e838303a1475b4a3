//! Error types for the page-harvest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`HarvestError`] — **Fatal**: the batch cannot proceed at all (bad URL
//!   list, navigation failure, the output document could not be written).
//!   Returned as `Err(HarvestError)` from the top-level `run_batch*`
//!   functions. No partial result is returned.
//!
//! * [`SkipReason`] — **Non-fatal**: a single annotated element could not be
//!   turned into a record (unparsable payload, detached from the DOM before
//!   capture) but every other element is fine. Skips are collected into
//!   [`crate::output::BatchOutput::skipped`] so callers can see what was
//!   dropped instead of digging through logs.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the page-harvest library.
///
/// Element-level failures use [`SkipReason`] and never surface here.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The batch request carried no usable URL list.
    #[error("Please provide a valid array of URLs.")]
    InvalidInput,

    // ── Browser errors ────────────────────────────────────────────────────
    /// The browser process could not be started or no tab could be opened.
    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    /// Navigating the shared page to `url` failed.
    #[error("Failed to navigate to '{url}': {detail}")]
    Navigation { url: String, detail: String },

    /// Querying the DOM of `url` for annotated elements failed.
    #[error("DOM query failed on '{url}': {detail}")]
    Query { url: String, detail: String },

    /// The browser failed to photograph an element still attached to the page.
    #[error("Snapshot of '{key}' on '{url}' failed: {detail}")]
    Capture { url: String, key: String, detail: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// A record could not be laid into the output document.
    #[error("Failed to compose record '{key}': {detail}")]
    Compose { key: String, detail: String },

    /// The output document could not be serialised.
    #[error("Failed to finalise document: {0}")]
    Finalize(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create a directory or write an artifact.
    #[error("Failed to write '{path}': {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single annotated element produced no record.
///
/// Stored in [`crate::output::SkippedElement`]. The batch always continues.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The element has no `id`, so it cannot anchor deduplication or capture.
    #[error("element has no id")]
    MissingId,

    /// The payload attribute could not be decoded or parsed.
    #[error("payload could not be decoded: {detail}")]
    Decode { detail: String },

    /// The payload nests deeper than the configured flatten limit.
    #[error("payload nests deeper than {max_depth} levels")]
    CyclicPayload { max_depth: usize },

    /// The capture target left the live DOM between query and capture.
    #[error("element is no longer attached to the page")]
    StaleHandle,

    /// The capture target has zero width or height.
    #[error("element has an empty bounding box ({width}x{height})")]
    EmptyGeometry { width: f64, height: f64 },

    /// Same `uniqueKey` already harvested on this page; first occurrence wins.
    #[error("duplicate of '{unique_key}'")]
    Duplicate { unique_key: String },
}

impl SkipReason {
    /// Duplicates are expected on pages with shared containers; they are
    /// counted but not reported as failures.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SkipReason::Duplicate { .. })
    }
}

/// Decoding failure for a structured-payload attribute.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The attribute was present but empty.
    #[error("payload attribute is empty")]
    Empty,

    /// The decoded text is not a valid serialised value.
    #[error("invalid payload at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
}

impl From<serde_json::Error> for PayloadError {
    fn from(e: serde_json::Error) -> Self {
        PayloadError::Parse {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}

/// Flattening failure.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// Nesting exceeded the depth guard; treated as a cyclic payload.
    #[error("payload nests deeper than {max_depth} levels at '{path}'")]
    CyclicPayload { max_depth: usize, path: String },
}

/// Failure reported by a [`crate::browser::PageSession`] implementation.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BrowserError(pub String);

impl BrowserError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_display_matches_boundary_message() {
        let e = HarvestError::InvalidInput;
        assert_eq!(e.to_string(), "Please provide a valid array of URLs.");
    }

    #[test]
    fn navigation_display() {
        let e = HarvestError::Navigation {
            url: "https://example.com".into(),
            detail: "net::ERR_NAME_NOT_RESOLVED".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("https://example.com"), "got: {msg}");
        assert!(msg.contains("ERR_NAME_NOT_RESOLVED"), "got: {msg}");
    }

    #[test]
    fn skip_reason_serialises_with_kind_tag() {
        let json = serde_json::to_value(SkipReason::StaleHandle).unwrap();
        assert_eq!(json["kind"], "stale_handle");

        let json = serde_json::to_value(SkipReason::Decode {
            detail: "eof".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "decode");
        assert_eq!(json["detail"], "eof");
    }

    #[test]
    fn duplicate_is_not_a_failure() {
        assert!(SkipReason::Duplicate {
            unique_key: "a".into()
        }
        .is_duplicate());
        assert!(!SkipReason::MissingId.is_duplicate());
    }

    #[test]
    fn payload_error_from_serde_keeps_position() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\": }").unwrap_err();
        let e = PayloadError::from(err);
        match e {
            PayloadError::Parse { line, column, .. } => {
                assert_eq!(line, 1);
                assert!(column > 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
