//! Extraction orchestrator: documents in, persisted structured results out.
//!
//! Documents are processed strictly one after another. After every document
//! that produced a result the complete result set is rewritten to the output
//! file, so an interrupted run loses at most the document in flight and can be
//! resumed with [`ExtractionConfig::continue_from_existing`].

use crate::config::{ExtractionConfig, EXTRACTION_TEMPERATURE};
use crate::engine::{collect_completion, CompletionEngine, CompletionRequest};
use crate::error::{DocumentError, RecordScrapeError};
use crate::output::{ExtractionOutput, ExtractionResult, ExtractionStats, ModelOptions, ResultSet};
use crate::pipeline::input::{self, Document, DocumentKeys};
use crate::pipeline::parse::{parse_response, strip_echo};
use crate::pipeline::trim::trim_to_budget;
use crate::progress::SkipReason;
use crate::prompts::{extraction_prompt, preview};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract structured data from every document and persist it to `output_path`.
///
/// Returns `Ok` even when individual documents fail; those are listed in
/// [`ExtractionOutput::failures`] and have no result recorded, so a resumed
/// run retries them. Errors are returned only for problems that stop the run
/// as a whole: an unreadable existing output file, or a failed write.
///
/// # Example
/// ```rust,no_run
/// use recordscrape::{run_extraction, ExtractionConfig, LlamaServerEngine};
/// use recordscrape::pipeline::input::{load_documents, load_schema, DocumentKeys};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let docs = load_documents(Path::new("records.json"), &DocumentKeys::default())?;
/// let schema = load_schema(Path::new("schema.json"))?;
/// let engine = LlamaServerEngine::new(LlamaServerEngine::DEFAULT_URL, 600)?;
/// let config = ExtractionConfig::builder().continue_from_existing(true).build()?;
/// let out = run_extraction(&docs, &schema, &engine, Path::new("results.json"), &config).await?;
/// eprintln!("{} parsed, {} failed", out.stats.parsed, out.stats.failed);
/// # Ok(())
/// # }
/// ```
pub async fn run_extraction<E: CompletionEngine + ?Sized>(
    documents: &[Document],
    schema: &Value,
    engine: &E,
    output_path: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, RecordScrapeError> {
    let start = Instant::now();
    let schema_text = serde_json::to_string(schema)
        .map_err(|e| RecordScrapeError::Internal(format!("schema serialization: {e}")))?;

    let mut results = ResultSet::load(output_path)?;
    let already_done = results.ids();
    if !already_done.is_empty() {
        info!(
            "{} results already present in {}",
            already_done.len(),
            output_path.display()
        );
    }

    let total = documents.len();
    let mut stats = ExtractionStats {
        total,
        ..Default::default()
    };
    let mut failures = Vec::new();

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total, results.len());
    }

    for (idx, doc) in documents.iter().enumerate() {
        if config.continue_from_existing && already_done.contains(&doc.id) {
            debug!("Document {}: already processed, skipping", doc.id);
            stats.skipped_existing += 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_skipped(&doc.id, SkipReason::AlreadyProcessed);
            }
            continue;
        }

        if doc.is_blank() {
            warn!("Document {}: blank text, skipping", doc.id);
            stats.skipped_blank += 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_document_skipped(&doc.id, SkipReason::BlankText);
            }
            continue;
        }

        info!("Document {} ({}/{}): {} chars", doc.id, idx + 1, total, doc.text.len());
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(&doc.id, idx + 1, total);
        }

        match extract_document(doc, &schema_text, engine, config).await {
            Ok(result) => {
                let parsed = result.is_parsed();
                let response_len = result.response.len();
                if parsed {
                    stats.parsed += 1;
                } else {
                    stats.unparsed += 1;
                }
                stats.processed += 1;

                results.upsert(result);
                results.save(output_path)?;
                debug!("Saved {} results to {}", results.len(), output_path.display());

                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_complete(&doc.id, parsed, response_len);
                }
            }
            Err(e) => {
                warn!("{}", e);
                stats.failed += 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_document_error(&doc.id, &e.to_string());
                }
                failures.push(e);
            }
        }
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Extraction complete: {} processed ({} parsed), {} skipped, {} failed, {}ms",
        stats.processed,
        stats.parsed,
        stats.skipped_existing + stats.skipped_blank,
        stats.failed,
        stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&stats);
    }

    Ok(ExtractionOutput {
        results,
        stats,
        failures,
    })
}

/// Run one document through trim, prompt, completion and parse.
///
/// A completion that is not valid JSON still yields a result (with
/// `data: None`); only engine failures are errors.
pub async fn extract_document<E: CompletionEngine + ?Sized>(
    doc: &Document,
    schema_text: &str,
    engine: &E,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, DocumentError> {
    let trimmed = trim_to_budget(&doc.text, engine, config.max_document_tokens(), &config.trim)
        .await
        .map_err(|e| DocumentError::TokenizeFailed {
            id: doc.id.to_string(),
            detail: e.to_string(),
        })?;

    let prompt = extraction_prompt(config.prompt_template.as_deref(), &trimmed.text, schema_text);
    debug!(
        "Prompt for {} ({} bytes):\n{}",
        doc.id,
        prompt.len(),
        preview(&prompt, config.preview_chars)
    );

    let request = CompletionRequest {
        prompt: prompt.clone(),
        max_tokens: config.response_tokens,
        stop: config.stop.clone(),
        temperature: EXTRACTION_TEMPERATURE,
        echo: config.echo,
    };

    let completion_failed = |e: crate::error::EngineError| DocumentError::CompletionFailed {
        id: doc.id.to_string(),
        detail: e.to_string(),
    };
    let stream = engine.complete(&request).await.map_err(completion_failed)?;
    let completion = collect_completion(stream).await.map_err(completion_failed)?;

    let response = if config.echo {
        strip_echo(&completion.text, &prompt).to_string()
    } else {
        completion.text
    };
    debug!(
        "Response for {} ({} chars, finish: {:?}):\n{}",
        doc.id,
        response.len(),
        completion.finish_reason,
        response
    );

    let data = parse_response(&response);
    if data.is_none() {
        warn!("Document {}: response is not valid JSON, recording data: null", doc.id);
    }

    Ok(ExtractionResult {
        id: doc.id.clone(),
        text: doc.text.clone(),
        prompt,
        response,
        data,
        model_options: ModelOptions::snapshot(engine.model_name(), config),
    })
}

/// Load documents and schema from disk, then run [`run_extraction`].
///
/// Input problems are reported before the engine sees any document.
pub async fn run_extraction_from_paths<E: CompletionEngine + ?Sized>(
    input_path: &Path,
    schema_path: &Path,
    output_path: &Path,
    keys: &DocumentKeys,
    engine: &E,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, RecordScrapeError> {
    let documents = input::load_documents(input_path, keys)?;
    let schema = input::load_schema(schema_path)?;
    run_extraction(&documents, &schema, engine, output_path, config).await
}
