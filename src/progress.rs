//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the pending files.
//!
//! The session forwards every status message it publishes on its
//! `watch` channel to the configured callback as well, so a terminal
//! progress bar and a UI snapshot never disagree about what is happening.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_batch::{BatchConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter {
//!     skipped: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for SkipCounter {
//!     fn on_file_skipped(&self, name: String, reason: String) {
//!         self.skipped.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("skipped {name}: {reason}");
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(SkipCounter { skipped: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::config::ConversionMode;
use crate::output::ConversionResult;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// Implementations must be `Send + Sync`: combined-mode extraction runs
/// several files concurrently. All methods default to no-ops.
///
/// Arguments are owned so implementations can move them into spawned tasks.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, before any extraction starts.
    fn on_run_start(&self, total_files: usize, mode: ConversionMode) {
        let _ = (total_files, mode);
    }

    /// Called whenever the human-readable status line changes.
    fn on_status(&self, status: String) {
        let _ = status;
    }

    /// Called when text was extracted from a file.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position of the file in the pending set
    /// * `chars`: length of the extracted text in characters
    fn on_file_extracted(&self, name: String, index: usize, total: usize, chars: usize) {
        let _ = (name, index, total, chars);
    }

    /// Called when a file is skipped (extraction or transformation failed).
    fn on_file_skipped(&self, name: String, reason: String) {
        let _ = (name, reason);
    }

    /// Called for every result as soon as it exists.
    ///
    /// In individual mode this fires once per converted file, in order.
    fn on_result(&self, result: ConversionResult) {
        let _ = result;
    }

    /// Called once after the run finished, successfully or not.
    fn on_run_complete(&self, converted: usize, total_files: usize) {
        let _ = (converted, total_files);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
