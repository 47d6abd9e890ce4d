//! Progress-callback trait for per-document extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as a batch moves through its documents.
//!
//! # Example
//!
//! ```rust
//! use admission_tables::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     records: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _index: usize, _total: usize, source: &str, records: usize) {
//!         self.records.fetch_add(records, Ordering::SeqCst);
//!         eprintln!("{source}: {records} records");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { records: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch driver as it processes each document.
///
/// Documents run concurrently, so implementations must be `Send + Sync` and
/// protect shared state themselves. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any document is decoded.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a document is decoded.
    ///
    /// # Arguments
    /// * `index`  — 1-indexed position of the document in the batch
    /// * `total`  — number of documents in the batch
    /// * `source` — display name of the document
    fn on_document_start(&self, index: usize, total: usize, source: &str) {
        let _ = (index, total, source);
    }

    /// Called when a document was decoded and extracted (possibly with
    /// block-level errors recorded in its summary).
    fn on_document_complete(&self, index: usize, total: usize, source: &str, records: usize) {
        let _ = (index, total, source, records);
    }

    /// Called when a document could not be decoded at all.
    fn on_document_error(&self, index: usize, total: usize, source: &str, error: &str) {
        let _ = (index, total, source, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, records: usize) {
        let _ = (total_documents, records);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        records: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_document_start(&self, _index: usize, _total: usize, _source: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _index: usize, _total: usize, _source: &str, records: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.records.fetch_add(records, Ordering::SeqCst);
        }

        fn on_document_error(&self, _index: usize, _total: usize, _source: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(1, 2, "a.pdf");
        cb.on_document_complete(1, 2, "a.pdf", 10);
        cb.on_document_error(2, 2, "b.xlsx", "bad zip");
        cb.on_batch_complete(2, 10);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start(1, 2, "a.pdf");
        tracker.on_document_complete(1, 2, "a.pdf", 7);
        tracker.on_document_start(2, 2, "b.pdf");
        tracker.on_document_error(2, 2, "b.pdf", "decode failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.records.load(Ordering::SeqCst), 7);
    }
}
