//! Progress-callback trait for export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive
//! events as the renderer walks the parsed document.
//!
//! # Why callbacks instead of channels?
//!
//! A callback is the least-invasive integration point: a host can forward
//! events to a terminal progress bar, a UI toast, or a log sink without the
//! library knowing how the host communicates. Skipped images are reported
//! here rather than returned as errors, because they do not fail the export.
//!
//! # Example
//!
//! ```rust
//! use ebook_export::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter(AtomicUsize);
//!
//! impl ExportProgressCallback for SkipCounter {
//!     fn on_image_skipped(&self, locator: &str, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("skipped {locator}: {error}");
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(SkipCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::config::ExportFormat;
use crate::model::ExportStats;
use std::sync::Arc;

/// Called by the renderers as an export progresses.
///
/// Implementations must be `Send + Sync`. All methods have default no-op
/// implementations so callers only override what they care about. Events
/// for one export arrive strictly in order; elements are rendered
/// sequentially.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once after the content has been parsed, before the cover.
    ///
    /// # Arguments
    /// * `format`:         output format being rendered
    /// * `total_elements`: number of parsed elements that will be laid out
    fn on_export_start(&self, format: ExportFormat, total_elements: usize) {
        let _ = (format, total_elements);
    }

    /// Called after each parsed element has been laid out (or skipped).
    ///
    /// # Arguments
    /// * `index`: 1-indexed element position
    /// * `total`: total parsed elements
    fn on_element_complete(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when an image could not be resolved and was left out.
    fn on_image_skipped(&self, locator: &str, error: &str) {
        let _ = (locator, error);
    }

    /// Called once after the document bytes have been produced.
    fn on_export_complete(&self, stats: &ExportStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CoverKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        completes: AtomicUsize,
        skipped: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ExportProgressCallback for TrackingCallback {
        fn on_export_start(&self, _format: ExportFormat, total_elements: usize) {
            self.started_total.store(total_elements, Ordering::SeqCst);
        }

        fn on_element_complete(&self, _index: usize, _total: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_skipped(&self, _locator: &str, _error: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_export_complete(&self, stats: &ExportStats) {
            self.finished.store(stats.elements, Ordering::SeqCst);
        }
    }

    fn stats(elements: usize) -> ExportStats {
        ExportStats {
            format: ExportFormat::Pdf,
            elements,
            images_embedded: 0,
            images_skipped: 1,
            pages: Some(2),
            cover: CoverKind::TitlePage,
            duration_ms: 5,
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(ExportFormat::Docx, 3);
        cb.on_element_complete(1, 3);
        cb.on_image_skipped("https://example.com/a.png", "HTTP 404");
        cb.on_export_complete(&stats(3));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_export_start(ExportFormat::Pdf, 3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_element_complete(1, 3);
        tracker.on_image_skipped("broken.png", "decode failed");
        tracker.on_element_complete(2, 3);
        tracker.on_element_complete(3, 3);
        tracker.on_export_complete(&stats(3));

        assert_eq!(tracker.completes.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.finished.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_export_start(ExportFormat::Pdf, 10);
        cb.on_element_complete(1, 10);
    }
}
