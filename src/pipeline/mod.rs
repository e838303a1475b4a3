//! Pipeline stages for turning annotated page elements into records.
//!
//! Each submodule implements one transformation step and is testable on
//! its own, without a browser.
//!
//! ## Data Flow
//!
//! ```text
//! DomCandidate ──▶ payload ──▶ flatten ──▶ harvest ──▶ scale ──▶ compose
//!  (raw attr)     (decode)    (k:v text)  (dedupe +   (embed    (row /
//!                                          snapshot)   size)     block)
//! ```
//!
//! 1. [`payload`] — undo HTML entity escaping and parse the attribute as JSON
//! 2. [`flatten`] — walk the payload into ordered `path:value` pairs
//! 3. [`harvest`] — resolve containers, dedupe by `uniqueKey`, capture PNGs
//! 4. [`scale`]   — fit each snapshot's natural size into the embed bounds

pub mod flatten;
pub mod harvest;
pub mod payload;
pub mod scale;
