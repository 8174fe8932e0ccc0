//! Progress-callback trait for per-file quote events.
//!
//! Inject an [`Arc<dyn QuoteProgressCallback>`] via
//! [`crate::config::QuoteConfigBuilder::progress_callback`] to receive events
//! as the pipeline works through each file.
//!
//! The job store records the same milestones for pollers; the callback is the
//! in-process route, used by the CLI progress bar.
//!
//! # Example
//!
//! ```rust
//! use certquote::{QuoteConfig, QuoteProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl QuoteProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, name: &str, pages: u32) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {}: {} pages", index + 1, total, name, pages);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = QuoteConfig::builder()
//!     .progress_callback(counter as Arc<dyn QuoteProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the quote pipeline as it processes each file.
///
/// Files are processed concurrently, so the per-file methods may be called
/// from different tasks at once. Implementations protect shared state with
/// `Mutex` or atomics. Every method defaults to a no-op.
pub trait QuoteProgressCallback: Send + Sync {
    /// Called once after intake, before any vendor call.
    fn on_quote_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is sent to OCR. `index` is 0-based.
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a file has been counted and priced.
    fn on_file_complete(&self, index: usize, total: usize, name: &str, pages: u32) {
        let _ = (index, total, name, pages);
    }

    /// Called when a file failed or was skipped.
    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after pricing, with the number of files that produced pages.
    fn on_quote_complete(&self, total_files: usize, priced_files: usize) {
        let _ = (total_files, priced_files);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl QuoteProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::QuoteConfig`].
pub type ProgressCallback = Arc<dyn QuoteProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: Mutex<Vec<String>>,
        priced: AtomicUsize,
    }

    impl QuoteProgressCallback for TrackingCallback {
        fn on_file_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _index: usize, _total: usize, _name: &str, _pages: u32) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _index: usize, _total: usize, name: &str, error: &str) {
            self.errors.lock().unwrap().push(format!("{name}: {error}"));
        }

        fn on_quote_complete(&self, _total_files: usize, priced_files: usize) {
            self.priced.store(priced_files, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_quote_start(2);
        cb.on_file_start(0, 2, "a.pdf");
        cb.on_file_complete(0, 2, "a.pdf", 3);
        cb.on_file_error(1, 2, "b.pdf", "OCR failed");
        cb.on_quote_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_file_start(0, 2, "a.pdf");
        cb.on_file_complete(0, 2, "a.pdf", 1);
        cb.on_file_start(1, 2, "b.png");
        cb.on_file_error(1, 2, "b.png", "timeout");
        cb.on_quote_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.errors.lock().unwrap(), vec!["b.png: timeout"]);
        assert_eq!(tracker.priced.load(Ordering::SeqCst), 1);
    }
}
