//! CLI binary for recordscrape.
//!
//! A thin shim over the library crate: `split` maps flags to a
//! `MarkerConfig`, `extract` maps them to an engine and an `ExtractionConfig`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use recordscrape::pipeline::input::{load_markers, DocumentId, DocumentKeys};
use recordscrape::{
    run_extraction_from_paths, split_to_file, CompletionEngine, ExtractionConfig,
    ExtractionProgressCallback, ExtractionStats, LlamaServerEngine, MarkerConfig, ProgressCallback,
    ProviderEngine, RecordScrapeError, SkipReason,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across all documents plus a log line
/// per document.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} documents  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total: usize, already_done: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
        let resumed = if already_done > 0 {
            format!(" ({already_done} results already on disk)")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total} documents…{resumed}"))
        ));
    }

    fn on_document_skipped(&self, id: &DocumentId, reason: SkipReason) {
        if reason == SkipReason::BlankText {
            self.bar
                .println(format!("  {} {:<12}  {}", dim("·"), id.to_string(), dim("blank, skipped")));
        }
        self.bar.inc(1);
    }

    fn on_document_start(&self, id: &DocumentId, _position: usize, _total: usize) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(id.to_string());
    }

    fn on_document_complete(&self, id: &DocumentId, parsed: bool, response_len: usize) {
        let mark = if parsed { green("✓") } else { yellow("?") };
        let note = if parsed { "" } else { "  invalid JSON, data: null" };
        self.bar.println(format!(
            "  {} {:<12}  {:<8}  {}{}",
            mark,
            id.to_string(),
            dim(&format!("{response_len:>5} chars")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
            yellow(note),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, id: &DocumentId, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<12}  {}  {}",
            red("✗"),
            id.to_string(),
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, stats: &ExtractionStats) {
        self.bar.finish_and_clear();
        let mark = if stats.failed == 0 { green("✔") } else { cyan("⚠") };
        eprintln!(
            "{} {} parsed, {} unparsed, {} skipped, {} failed",
            mark,
            bold(&stats.parsed.to_string()),
            stats.unparsed,
            stats.skipped_existing + stats.skipped_blank,
            red(&self.errors.load(Ordering::SeqCst).to_string()),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split an OCR text dump into records (NY breach-notice markers by default)
  recordscrape split foil-release.txt records.json

  # Split with a custom marker vocabulary
  recordscrape split dump.txt records.json --markers markers.json

  # Extract against a local llama.cpp server (llama-server -m model.gguf -c 4096)
  recordscrape extract records.json schema.json results.json

  # Resume an interrupted run
  recordscrape extract records.json schema.json results.json --continue-from-outfile

  # Use a hosted chat model instead
  recordscrape extract records.json schema.json results.json --engine provider --provider openai --model gpt-4.1-mini

MARKER FILE:
  {
    "page_markers": ["FOIL G000569-102422"],
    "record_markers": [
      {"text": "NEW YORK STATE SECURITY BREACH REPORTING FORM", "pages": 2},
      "NOTICE OF DATA BREACH"
    ]
  }

ENVIRONMENT VARIABLES:
  LLAMA_SERVER_URL        llama.cpp server URL (default http://127.0.0.1:8080)
  OPENAI_API_KEY          OpenAI API key (provider engine)
  ANTHROPIC_API_KEY       Anthropic API key (provider engine)
  EDGEQUAKE_LLM_PROVIDER  Provider for the provider engine
  EDGEQUAKE_MODEL         Model ID for the provider engine
  RUST_LOG                Override log filter
"#;

/// Split document dumps into records and extract structured JSON with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "recordscrape",
    version,
    about = "Split document dumps into records and extract structured JSON with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RECORDSCRAPE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RECORDSCRAPE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Segment a raw text file into pages and records, written as [{text, pg}].
    Split {
        /// Raw newline-delimited text file.
        infile: PathBuf,

        /// Output JSON file.
        outfile: PathBuf,

        /// JSON marker file; defaults to the NY breach-notice vocabulary.
        #[arg(long, env = "RECORDSCRAPE_MARKERS")]
        markers: Option<PathBuf>,
    },

    /// Extract structured data from a JSON array of documents.
    Extract(ExtractArgs),
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    /// JSON array of objects holding the documents.
    infile: PathBuf,

    /// JSON schema the extracted records should follow.
    schema: PathBuf,

    /// Results file; rewritten after every document.
    outfile: PathBuf,

    /// Completion engine.
    #[arg(long, value_enum, env = "RECORDSCRAPE_ENGINE", default_value = "llama")]
    engine: EngineArg,

    /// llama.cpp server URL.
    #[arg(long, env = "LLAMA_SERVER_URL", default_value = LlamaServerEngine::DEFAULT_URL)]
    server_url: String,

    /// Chat provider for `--engine provider` (openai, anthropic, gemini, ollama, …).
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model ID. For llama.cpp this only names the model in the results.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Model context size in tokens.
    #[arg(long, env = "RECORDSCRAPE_N_CTX", default_value_t = 4096)]
    n_ctx: usize,

    /// Tokens reserved for the response.
    #[arg(long, env = "RECORDSCRAPE_N_TOKENS", default_value_t = 1024)]
    n_tokens: usize,

    /// Key holding the document text.
    #[arg(long, env = "RECORDSCRAPE_KEYDOC", default_value = "text")]
    keydoc: String,

    /// Key holding the document id.
    #[arg(long, env = "RECORDSCRAPE_KEYID", default_value = "pg")]
    keyid: String,

    /// Skip documents that already have a result in the output file.
    #[arg(long, env = "RECORDSCRAPE_CONTINUE")]
    continue_from_outfile: bool,

    /// Text file with a custom prompt template ({document}, {schema}, ending in "{").
    #[arg(long, env = "RECORDSCRAPE_PROMPT_TEMPLATE")]
    prompt_template: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "RECORDSCRAPE_TIMEOUT", default_value_t = 600)]
    timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "RECORDSCRAPE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EngineArg {
    /// llama.cpp HTTP server.
    Llama,
    /// Chat provider via edgequake-llm.
    Provider,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress,
        Command::Split { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Split {
            ref infile,
            ref outfile,
            ref markers,
        } => run_split(infile, outfile, markers.as_deref(), cli.quiet),
        Command::Extract(ref args) => run_extract(args, show_progress, cli.quiet).await,
    }
}

fn run_split(infile: &Path, outfile: &Path, markers: Option<&Path>, quiet: bool) -> Result<()> {
    let markers = match markers {
        Some(path) => load_markers(path).context("Failed to load marker file")?,
        None => MarkerConfig::ny_breach_notices(),
    };

    let stats = split_to_file(infile, outfile, &markers).context("Split failed")?;

    if !quiet {
        eprintln!(
            "{}  {} lines → {} pages → {} records  {}ms  →  {}",
            green("✔"),
            stats.lines,
            stats.pages,
            bold(&stats.records.to_string()),
            stats.duration_ms,
            bold(&outfile.display().to_string()),
        );
    }
    Ok(())
}

async fn run_extract(args: &ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let engine = build_engine(args).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb).await?;

    let keys = DocumentKeys {
        id: args.keyid.clone(),
        text: args.keydoc.clone(),
    };

    let output = run_extraction_from_paths(
        &args.infile,
        &args.schema,
        &args.outfile,
        &keys,
        engine.as_ref(),
        &config,
    )
    .await
    .context("Extraction failed")?;

    if !quiet {
        let stats = &output.stats;
        if !show_progress {
            eprintln!(
                "Extracted {}/{} documents in {}ms ({} parsed, {} skipped)",
                stats.processed,
                stats.total,
                stats.duration_ms,
                stats.parsed,
                stats.skipped_existing + stats.skipped_blank,
            );
            if stats.failed > 0 {
                eprintln!("  {} documents failed", stats.failed);
            }
        }
        eprintln!(
            "   {} results  →  {}",
            dim(&output.results.len().to_string()),
            bold(&args.outfile.display().to_string()),
        );
    }

    Ok(())
}

/// Construct the selected completion engine.
async fn build_engine(args: &ExtractArgs) -> Result<Box<dyn CompletionEngine>> {
    match args.engine {
        EngineArg::Llama => {
            let engine = LlamaServerEngine::new(&args.server_url, args.timeout)
                .context("Invalid llama.cpp server settings")?;
            let model = match args.model {
                Some(ref m) => Some(m.clone()),
                None => engine.detect_model().await.map_err(|e| {
                    RecordScrapeError::EngineNotConfigured {
                        engine: "llama".into(),
                        hint: format!(
                            "Could not reach the llama.cpp server at {}.\n\
                             Start it with: llama-server -m model.gguf -c {}\n\
                             Error: {e}",
                            args.server_url, args.n_ctx
                        ),
                    }
                })?,
            };
            let engine = match model {
                Some(m) => engine.with_model_name(m),
                None => engine,
            };
            Ok(Box::new(engine))
        }
        EngineArg::Provider => {
            let engine = ProviderEngine::resolve(args.provider.as_deref(), args.model.as_deref())?;
            Ok(Box::new(engine))
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(args: &ExtractArgs, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .context_size(args.n_ctx)
        .response_tokens(args.n_tokens)
        .continue_from_existing(args.continue_from_outfile);

    if let Some(ref path) = args.prompt_template {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
