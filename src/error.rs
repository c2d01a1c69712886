//! Error types for the recordscrape library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`RecordScrapeError`]: **Fatal**: the run cannot proceed at all
//!   (missing input file, malformed document array, unparseable schema,
//!   unwritable output). Returned as `Err(RecordScrapeError)` from the
//!   top-level `run_extraction` / `split_*` functions, always before any
//!   document has been sent to the model.
//!
//! * [`DocumentError`]: **Non-fatal**: a single document failed (the engine
//!   refused the prompt, the connection dropped mid-stream) but the run goes
//!   on. Collected in [`crate::output::ExtractionOutput::failures`].
//!
//! * [`EngineError`]: what a [`crate::engine::CompletionEngine`] adapter
//!   reports. The orchestrator wraps it into a [`DocumentError`].
//!
//! Malformed model JSON is not an error at all: it is recorded as a result
//! with `data: null` so it can be re-processed later.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the recordscrape library.
#[derive(Debug, Error)]
pub enum RecordScrapeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure while reading an input file.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but does not contain valid JSON.
    #[error("'{path}' is not valid JSON: {detail}")]
    InvalidJson { path: PathBuf, detail: String },

    /// The document array is structurally wrong (empty, not an array of objects).
    #[error("Invalid input documents: {0}")]
    InvalidInput(String),

    /// A document object lacks the configured id or text key.
    #[error("Document #{index} has no key '{key}'\nUse --keyid / --keydoc to select the right fields.")]
    MissingKey { index: usize, key: String },

    /// The schema file could not be parsed as JSON.
    #[error("Schema file '{path}' is not valid JSON: {detail}")]
    InvalidSchema { path: PathBuf, detail: String },

    /// A marker could not be compiled into a pattern.
    #[error("Invalid marker '{marker}': {detail}")]
    InvalidMarker { marker: String, detail: String },

    /// The existing output artifact could not be loaded for resumption.
    #[error("Existing results file '{path}' is unreadable: {detail}\nMove it aside or fix it before resuming.")]
    CorruptResults { path: PathBuf, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The configured completion engine could not be constructed.
    #[error("Completion engine '{engine}' is not configured.\n{hint}")]
    EngineNotConfigured { engine: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
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

impl RecordScrapeError {
    /// Map an I/O error on `path` to the most specific variant.
    pub(crate) fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => RecordScrapeError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => RecordScrapeError::PermissionDenied { path },
            _ => RecordScrapeError::ReadFailed { path, source: err },
        }
    }
}

/// A non-fatal error for a single document.
///
/// The run continues; no result is recorded for the document, so a resumed
/// run will try it again.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// Measuring the document against the token budget failed.
    #[error("Document {id}: tokenization failed: {detail}")]
    TokenizeFailed { id: String, detail: String },

    /// The completion call failed before or during streaming.
    #[error("Document {id}: completion failed: {detail}")]
    CompletionFailed { id: String, detail: String },
}

/// Errors reported by a completion engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request never got a response (connection refused, timeout, …).
    #[error("HTTP request to {url} failed: {detail}")]
    Http { url: String, detail: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The server's payload did not have the expected shape.
    #[error("Unexpected engine response: {0}")]
    Protocol(String),

    /// A chat provider returned an error.
    #[error("LLM provider error: {0}")]
    Provider(String),
}
