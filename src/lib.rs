//! # recordscrape
//!
//! Turn bulk document dumps into structured JSON records with a local or
//! hosted language model.
//!
//! ## Pipeline Overview
//!
//! Two independent paths share the record identity model:
//!
//! ```text
//! raw text ──▶ pages ──▶ record groups ──▶ [{text, pg}]          (split)
//!            (page      (record markers,
//!             markers)   fixed-span grabs)
//!
//! [{id, text}] ──▶ trim ──▶ prompt ──▶ engine ──▶ parse ──▶ results.json   (extract)
//!                (token    (schema +   (stream)  ({ + reply)  (upsert, saved
//!                 budget)   open fence)                        after each doc)
//! ```
//!
//! Extraction is resumable: every result records the model and budgets it was
//! produced with, the output file is rewritten after every document, and a
//! run with `continue_from_existing` skips ids that already have a result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recordscrape::{run_extraction, split_text, ExtractionConfig, LlamaServerEngine, MarkerConfig};
//! use recordscrape::pipeline::input::{Document, DocumentId};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let raw = std::fs::read_to_string("foil-release.txt")?;
//!     let groups = split_text(&raw, &MarkerConfig::ny_breach_notices())?;
//!     let docs: Vec<Document> = groups
//!         .into_iter()
//!         .map(|g| Document::new(DocumentId::from(g.pg), g.text))
//!         .collect();
//!
//!     let schema = serde_json::json!({"type": "object", "properties": {"organization": {"type": "string"}}});
//!     let engine = LlamaServerEngine::new(LlamaServerEngine::DEFAULT_URL, 600)?;
//!     let config = ExtractionConfig::default();
//!     let out = run_extraction(&docs, &schema, &engine, Path::new("results.json"), &config).await?;
//!     eprintln!("{} of {} documents parsed", out.stats.parsed, out.stats.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `recordscrape` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! recordscrape = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, TrimConfig, EXTRACTION_TEMPERATURE};
pub use engine::{
    collect_completion, ApproxTokenizer, CompletionChunk, CompletionEngine, CompletionRequest,
    CompletionStream, LlamaServerEngine, ProviderEngine, Tokenizer,
};
pub use error::{DocumentError, EngineError, RecordScrapeError};
pub use extract::{extract_document, run_extraction, run_extraction_from_paths};
pub use output::{ExtractionOutput, ExtractionResult, ExtractionStats, ModelOptions, ResultSet};
pub use pipeline::markers::{MarkerConfig, MarkerSet, MarkerSpec};
pub use pipeline::records::PageGroup;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, SkipReason};
pub use split::{split_file, split_text, split_to_file, SplitStats};
