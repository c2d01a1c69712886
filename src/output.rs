//! Output types: extraction results, the persisted result set and run statistics.

use crate::config::{ExtractionConfig, EXTRACTION_TEMPERATURE};
use crate::error::{DocumentError, RecordScrapeError};
use crate::pipeline::input::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Model and budget settings a result was produced with.
///
/// Kept with every result so a later run can find the documents worth
/// re-processing with a larger context or a different model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default, alias = "model_path")]
    pub model: String,
    #[serde(alias = "CONTEXT_SIZE")]
    pub context_size: usize,
    #[serde(alias = "RESPONSE_TOKENS")]
    pub response_tokens: usize,
    #[serde(default)]
    pub temperature: f32,
}

impl ModelOptions {
    pub fn snapshot(model: impl Into<String>, config: &ExtractionConfig) -> Self {
        Self {
            model: model.into(),
            context_size: config.context_size,
            response_tokens: config.response_tokens,
            temperature: EXTRACTION_TEMPERATURE,
        }
    }
}

/// The outcome of extracting one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: DocumentId,
    /// Original document text, before trimming.
    pub text: String,
    /// Full prompt sent to the engine.
    pub prompt: String,
    /// Raw completion, without any echoed prompt.
    pub response: String,
    /// Parsed JSON, or `null` when the completion was not valid JSON.
    pub data: Option<Value>,
    #[serde(alias = "llm_options")]
    pub model_options: ModelOptions,
}

impl ExtractionResult {
    pub fn is_parsed(&self) -> bool {
        self.data.is_some()
    }
}

/// Ordered results, at most one per document id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    results: Vec<ExtractionResult>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously written result file.
    ///
    /// A missing or empty file is an empty set; anything that does not parse
    /// as a result array is [`RecordScrapeError::CorruptResults`].
    pub fn load(path: &Path) -> Result<Self, RecordScrapeError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(RecordScrapeError::from_io(path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let set: Self = serde_json::from_str(&raw).map_err(|e| RecordScrapeError::CorruptResults {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        debug!("Loaded {} existing results from {}", set.len(), path.display());
        Ok(set)
    }

    /// Write the whole set as pretty JSON, atomically.
    pub fn save(&self, path: &Path) -> Result<(), RecordScrapeError> {
        write_json_atomic(path, self)
    }

    /// Insert `result`, replacing any existing result with the same id in place.
    pub fn upsert(&mut self, result: ExtractionResult) {
        match self.results.iter_mut().find(|r| r.id == result.id) {
            Some(existing) => *existing = result,
            None => self.results.push(result),
        }
    }

    pub fn get(&self, id: &DocumentId) -> Option<&ExtractionResult> {
        self.results.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> HashSet<DocumentId> {
        self.results.iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractionResult> {
        self.results.iter()
    }

    pub fn into_vec(self) -> Vec<ExtractionResult> {
        self.results
    }
}

/// Serialize `value` as pretty JSON to `path` via a temp file and rename.
///
/// Readers never observe a half-written file; an interrupted run leaves the
/// previous version in place.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RecordScrapeError> {
    let write_err = |source: std::io::Error| RecordScrapeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| write_err(e.into()))?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Documents in the input.
    pub total: usize,
    /// Documents sent to the engine that produced a result.
    pub processed: usize,
    /// Results whose completion parsed as JSON.
    pub parsed: usize,
    /// Results recorded with `data: null`.
    pub unparsed: usize,
    /// Documents skipped because a result already existed.
    pub skipped_existing: usize,
    /// Documents skipped because their text was blank.
    pub skipped_blank: usize,
    /// Documents the engine failed on.
    pub failed: usize,
    pub duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// The full result set as written to disk, prior results included.
    pub results: ResultSet,
    pub stats: ExtractionStats,
    pub failures: Vec<DocumentError>,
}
