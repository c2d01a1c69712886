//! Configuration types for record extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Budgets that used to be process-wide
//! constants (context size, response tokens) live here so that a later run can
//! re-process the same documents with different settings; every result records
//! the values it was produced with in its `model_options` snapshot.

use crate::error::RecordScrapeError;
use crate::progress::ProgressCallback;
use crate::prompts::{DOCUMENT_PLACEHOLDER, JSON_OPENER, SCHEMA_PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling temperature for every extraction request.
///
/// Fixed at zero so that a rerun over the same documents and settings asks
/// the model the same question and gets the same answer.
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use recordscrape::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .context_size(8192)
///     .response_tokens(2048)
///     .continue_from_existing(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_document_tokens(), 6144);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model context window in tokens. Default: 4096.
    pub context_size: usize,

    /// Tokens reserved for the model's answer. Default: 1024.
    ///
    /// Also the hard cap on generated tokens. The document is trimmed to
    /// `context_size - response_tokens` before the prompt is assembled.
    pub response_tokens: usize,

    /// Stop sequences passed to the engine. Default: a closing code fence.
    pub stop: Vec<String>,

    /// Ask the engine to echo the prompt before the completion. Default: false.
    ///
    /// The echoed prompt is stripped again before parsing.
    pub echo: bool,

    /// Skip documents whose id already has a result in the output file. Default: false.
    pub continue_from_existing: bool,

    /// Custom prompt template with `{document}` and `{schema}` placeholders.
    /// If None, uses [`crate::prompts::DEFAULT_PROMPT_TEMPLATE`].
    pub prompt_template: Option<String>,

    /// Maximum characters of each prompt shown in debug logs. Default: 1500.
    pub preview_chars: usize,

    /// Document trimming parameters.
    pub trim: TrimConfig,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            context_size: 4096,
            response_tokens: 1024,
            stop: vec!["```".to_string()],
            echo: false,
            continue_from_existing: false,
            prompt_template: None,
            preview_chars: 1500,
            trim: TrimConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("context_size", &self.context_size)
            .field("response_tokens", &self.response_tokens)
            .field("stop", &self.stop)
            .field("echo", &self.echo)
            .field("continue_from_existing", &self.continue_from_existing)
            .field("prompt_template", &self.prompt_template.as_ref().map(|_| "<custom>"))
            .field("trim", &self.trim)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Token budget available to the document text.
    pub fn max_document_tokens(&self) -> usize {
        self.context_size.saturating_sub(self.response_tokens)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn context_size(mut self, n: usize) -> Self {
        self.config.context_size = n;
        self
    }

    pub fn response_tokens(mut self, n: usize) -> Self {
        self.config.response_tokens = n;
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.config.stop = stop;
        self
    }

    pub fn echo(mut self, v: bool) -> Self {
        self.config.echo = v;
        self
    }

    pub fn continue_from_existing(mut self, v: bool) -> Self {
        self.config.continue_from_existing = v;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn preview_chars(mut self, n: usize) -> Self {
        self.config.preview_chars = n;
        self
    }

    pub fn trim(mut self, trim: TrimConfig) -> Self {
        self.config.trim = trim;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, RecordScrapeError> {
        let c = &self.config;
        if c.response_tokens == 0 {
            return Err(RecordScrapeError::InvalidConfig(
                "response tokens must be ≥ 1".into(),
            ));
        }
        if c.response_tokens >= c.context_size {
            return Err(RecordScrapeError::InvalidConfig(format!(
                "response tokens ({}) must be smaller than the context size ({})",
                c.response_tokens, c.context_size
            )));
        }
        if let Some(ref template) = c.prompt_template {
            for placeholder in [DOCUMENT_PLACEHOLDER, SCHEMA_PLACEHOLDER] {
                if !template.contains(placeholder) {
                    return Err(RecordScrapeError::InvalidConfig(format!(
                        "prompt template is missing the {placeholder} placeholder"
                    )));
                }
            }
            if !template.ends_with(JSON_OPENER) {
                return Err(RecordScrapeError::InvalidConfig(format!(
                    "prompt template must end with '{JSON_OPENER}' so the completion continues the JSON object"
                )));
            }
        }
        c.trim.validate()?;
        Ok(self.config)
    }
}

/// Parameters of the document trimmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimConfig {
    /// Whitespace tokens at the end of the document that are never dropped. Default: 50.
    ///
    /// Breach letters end with a signature block and contact details, which
    /// are often exactly the fields being extracted.
    pub keep_tail_tokens: usize,

    /// Tokens removed in front of the tail per shrink step. Default: 5.
    pub drop_block_tokens: usize,

    /// Maximum shrink steps before giving up with an over-budget text. Default: 200.
    pub max_iterations: usize,

    /// Lines longer than this many characters are dropped as noise. Default: 100.
    pub max_line_chars: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            keep_tail_tokens: 50,
            drop_block_tokens: 5,
            max_iterations: 200,
            max_line_chars: 100,
        }
    }
}

impl TrimConfig {
    fn validate(&self) -> Result<(), RecordScrapeError> {
        if self.drop_block_tokens == 0 {
            return Err(RecordScrapeError::InvalidConfig(
                "trim block size must be ≥ 1".into(),
            ));
        }
        if self.max_line_chars == 0 {
            return Err(RecordScrapeError::InvalidConfig(
                "max line length must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.context_size, 4096);
        assert_eq!(c.response_tokens, 1024);
        assert_eq!(c.stop, vec!["```".to_string()]);
        assert_eq!(c.max_document_tokens(), 3072);
        assert_eq!(c.trim.keep_tail_tokens, 50);
        assert_eq!(c.trim.max_iterations, 200);
    }

    #[test]
    fn response_must_fit_in_context() {
        let err = ExtractionConfig::builder()
            .context_size(1024)
            .response_tokens(1024)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("smaller than the context size"));
    }

    #[test]
    fn template_needs_placeholders_and_opener() {
        let missing = ExtractionConfig::builder()
            .prompt_template("Extract from {document}\n```\n{")
            .build();
        assert!(missing.is_err());

        let no_opener = ExtractionConfig::builder()
            .prompt_template("{document} {schema}")
            .build();
        assert!(no_opener.is_err());

        let ok = ExtractionConfig::builder()
            .prompt_template("Text: {document}\nSchema: {schema}\n```\n{")
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn zero_drop_block_rejected() {
        let trim = TrimConfig {
            drop_block_tokens: 0,
            ..TrimConfig::default()
        };
        assert!(ExtractionConfig::builder().trim(trim).build().is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let dbg = format!("{:?}", ExtractionConfig::default());
        assert!(dbg.contains("context_size: 4096"));
    }
}
