//! Progress-callback trait for per-URL and per-record batch events.
//!
//! Inject an [`Arc<dyn HarvestProgressCallback>`] via
//! [`crate::config::HarvestConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the batch. Events arrive strictly in
//! harvest order from a single task.
//!
//! # Example
//!
//! ```rust
//! use page_harvest::{HarvestConfig, HarvestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     appended: AtomicUsize,
//! }
//!
//! impl HarvestProgressCallback for CountingCallback {
//!     fn on_record_appended(&self, url: &str, element_index: usize, _unique_key: &str) {
//!         self.appended.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{url} #{element_index}");
//!     }
//! }
//!
//! let config = HarvestConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { appended: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::SkipReason;
use std::sync::Arc;

/// Called by the batch pipeline as it processes each URL and record.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait HarvestProgressCallback: Send + Sync {
    /// Called once before the first navigation.
    fn on_batch_start(&self, total_urls: usize) {
        let _ = total_urls;
    }

    /// Called before navigating to a URL.
    ///
    /// # Arguments
    /// * `url_index` — 1-indexed position in the batch
    fn on_url_start(&self, url_index: usize, total_urls: usize, url: &str) {
        let _ = (url_index, total_urls, url);
    }

    /// Called after a record has been laid into the document.
    ///
    /// # Arguments
    /// * `element_index` — 1-indexed position within the page
    fn on_record_appended(&self, url: &str, element_index: usize, unique_key: &str) {
        let _ = (url, element_index, unique_key);
    }

    /// Called for every element that produced no record, duplicates included.
    fn on_element_skipped(&self, url: &str, element_id: &str, reason: &SkipReason) {
        let _ = (url, element_id, reason);
    }

    /// Called once a URL is done.
    fn on_url_complete(&self, url_index: usize, total_urls: usize, records: usize) {
        let _ = (url_index, total_urls, records);
    }

    /// Called after the document has been written.
    fn on_batch_complete(&self, total_urls: usize, total_records: usize) {
        let _ = (total_urls, total_records);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl HarvestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::HarvestConfig`].
pub type ProgressCallback = Arc<dyn HarvestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        urls: AtomicUsize,
        records: AtomicUsize,
        skips: AtomicUsize,
        finished_records: AtomicUsize,
    }

    impl HarvestProgressCallback for TrackingCallback {
        fn on_url_start(&self, _i: usize, _total: usize, _url: &str) {
            self.urls.fetch_add(1, Ordering::SeqCst);
        }

        fn on_record_appended(&self, _url: &str, _idx: usize, _key: &str) {
            self.records.fetch_add(1, Ordering::SeqCst);
        }

        fn on_element_skipped(&self, _url: &str, _id: &str, _reason: &SkipReason) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total_urls: usize, total_records: usize) {
            self.finished_records.store(total_records, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_url_start(1, 2, "https://a");
        cb.on_record_appended("https://a", 1, "k");
        cb.on_element_skipped("https://a", "x", &SkipReason::StaleHandle);
        cb.on_url_complete(1, 2, 1);
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_url_start(1, 1, "https://a");
        tracker.on_record_appended("https://a", 1, "k1");
        tracker.on_record_appended("https://a", 2, "k2");
        tracker.on_element_skipped("https://a", "bad", &SkipReason::MissingId);
        tracker.on_batch_complete(1, 2);

        assert_eq!(tracker.urls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.records.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.finished_records.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(3);
    }
}
