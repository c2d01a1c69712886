//! Progress-callback trait for per-document extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the document list. Callers can
//! forward them to a terminal progress bar, a channel or a log without the
//! library knowing how the host application reports progress.
//!
//! # Example
//!
//! ```rust
//! use recordscrape::{ExtractionConfig, ExtractionProgressCallback};
//! use recordscrape::pipeline::input::DocumentId;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     parsed: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, id: &DocumentId, parsed: bool, response_len: usize) {
//!         if parsed {
//!             self.parsed.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("{id}: {response_len} chars");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { parsed: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ExtractionStats;
use crate::pipeline::input::DocumentId;
use std::sync::Arc;

/// Why a document was not sent to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Resuming, and the output file already holds a result for this id.
    AlreadyProcessed,
    /// The document text is empty or whitespace.
    BlankText,
}

/// Called by the orchestrator as it processes each document.
///
/// Documents are processed one at a time, so events arrive in order. All
/// methods have default no-op implementations.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the input and any prior results are loaded.
    ///
    /// # Arguments
    /// * `total`: documents in the input
    /// * `already_done`: results loaded from the existing output file
    fn on_run_start(&self, total: usize, already_done: usize) {
        let _ = (total, already_done);
    }

    fn on_document_skipped(&self, id: &DocumentId, reason: SkipReason) {
        let _ = (id, reason);
    }

    /// Called just before the prompt is built for a document.
    ///
    /// `position` is 1-based among all input documents.
    fn on_document_start(&self, id: &DocumentId, position: usize, total: usize) {
        let _ = (id, position, total);
    }

    /// Called after a result was recorded and the output file rewritten.
    fn on_document_complete(&self, id: &DocumentId, parsed: bool, response_len: usize) {
        let _ = (id, parsed, response_len);
    }

    /// Called when the engine failed on a document. The run continues.
    fn on_document_error(&self, id: &DocumentId, error: &str) {
        let _ = (id, error);
    }

    fn on_run_complete(&self, stats: &ExtractionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
