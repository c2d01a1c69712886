//! Input loading: document arrays, schemas, raw text and marker files.
//!
//! Everything here runs before the first document reaches the model, so any
//! problem is fatal and reported as a [`RecordScrapeError`] that names the
//! offending file.

use crate::error::RecordScrapeError;
use crate::pipeline::markers::MarkerConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Caller-supplied identity of a document: any JSON value (page number, string, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Value);

impl Eq for DocumentId {}

impl Hash for DocumentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_string().hash(state);
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<Value> for DocumentId {
    fn from(v: Value) -> Self {
        Self(v)
    }
}

impl From<usize> for DocumentId {
    fn from(n: usize) -> Self {
        Self(Value::from(n))
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(Value::from(s))
    }
}

/// One extraction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Whitespace-only documents are skipped rather than sent to the model.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Which object keys hold a document's id and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentKeys {
    pub id: String,
    pub text: String,
}

impl Default for DocumentKeys {
    fn default() -> Self {
        Self {
            id: "pg".into(),
            text: "text".into(),
        }
    }
}

/// Interpret a parsed JSON value as an array of documents.
///
/// The array must be non-empty, its first element must be an object holding
/// the text key, and every element must carry both keys. A `null` text is
/// read as blank.
pub fn parse_documents(value: Value, keys: &DocumentKeys) -> Result<Vec<Document>, RecordScrapeError> {
    let Value::Array(items) = value else {
        return Err(RecordScrapeError::InvalidInput(
            "input JSON must be an array of objects".into(),
        ));
    };
    if items.is_empty() {
        return Err(RecordScrapeError::InvalidInput("input JSON must not be blank".into()));
    }
    if !items[0].is_object() {
        return Err(RecordScrapeError::InvalidInput(
            "input JSON must be an array of objects".into(),
        ));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, mut item)| {
            let missing = |key: &str| RecordScrapeError::MissingKey {
                index,
                key: key.to_string(),
            };
            let obj = item.as_object_mut().ok_or_else(|| {
                RecordScrapeError::InvalidInput(format!("document #{index} is not an object"))
            })?;
            let text = obj.remove(&keys.text).ok_or_else(|| missing(&keys.text))?;
            let id = obj.remove(&keys.id).ok_or_else(|| missing(&keys.id))?;
            let text = match text {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => {
                    return Err(RecordScrapeError::InvalidInput(format!(
                        "document #{index}: '{}' must be a string, got {other}",
                        keys.text
                    )))
                }
            };
            Ok(Document {
                id: DocumentId(id),
                text,
            })
        })
        .collect()
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RecordScrapeError> {
    let raw = std::fs::read_to_string(path).map_err(|e| RecordScrapeError::from_io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| RecordScrapeError::InvalidJson {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Load the input document array from `path`.
pub fn load_documents(path: &Path, keys: &DocumentKeys) -> Result<Vec<Document>, RecordScrapeError> {
    let value: Value = read_json(path)?;
    let documents = parse_documents(value, keys)?;
    info!("Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

/// Load the target JSON schema. Any JSON value is accepted.
pub fn load_schema(path: &Path) -> Result<Value, RecordScrapeError> {
    read_json(path).map_err(|e| match e {
        RecordScrapeError::InvalidJson { path, detail } => {
            RecordScrapeError::InvalidSchema { path, detail }
        }
        other => other,
    })
}

/// Lines of a raw text file, read one at a time.
///
/// Each line keeps its `\n` terminator (the last one may lack it). Invalid
/// UTF-8 is replaced with U+FFFD, so stray bytes in an OCR dump do not stop
/// segmentation.
pub struct TextLines {
    reader: BufReader<File>,
    path: PathBuf,
    buf: Vec<u8>,
}

impl Iterator for TextLines {
    type Item = Result<String, RecordScrapeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(Ok(String::from_utf8_lossy(&self.buf).into_owned())),
            Err(e) => Some(Err(RecordScrapeError::from_io(self.path.clone(), e))),
        }
    }
}

/// Open a raw text file for line-by-line reading.
pub fn read_lines(path: &Path) -> Result<TextLines, RecordScrapeError> {
    let file = File::open(path).map_err(|e| RecordScrapeError::from_io(path, e))?;
    debug!("Reading lines from {}", path.display());
    Ok(TextLines {
        reader: BufReader::new(file),
        path: path.to_path_buf(),
        buf: Vec::new(),
    })
}

/// Load a marker vocabulary file.
pub fn load_markers(path: &Path) -> Result<MarkerConfig, RecordScrapeError> {
    let config: MarkerConfig = read_json(path)?;
    debug!(
        "Loaded {} page markers and {} record markers from {}",
        config.page_markers.len(),
        config.record_markers.len(),
        path.display()
    );
    Ok(config)
}
