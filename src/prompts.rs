//! Prompt template for completion-style JSON extraction.
//!
//! The prompt is written for base (non-chat) models: it shows the document
//! and the JSON schema, then opens a code fence and the first `{` of the
//! answer. The model only has to *continue* the object, and generation stops
//! at the closing fence. The orchestrator glues [`JSON_OPENER`] back in front
//! of the completion before parsing.
//!
//! Callers can override the template via
//! [`crate::config::ExtractionConfig::prompt_template`]; the constant here is
//! used only when no override is provided.

/// Placeholder replaced with the trimmed document text.
pub const DOCUMENT_PLACEHOLDER: &str = "{document}";

/// Placeholder replaced with the compact JSON schema.
pub const SCHEMA_PLACEHOLDER: &str = "{schema}";

/// Markdown code fence; also the default stop sequence.
pub const CODE_FENCE: &str = "```";

/// The text every prompt ends with, and which is re-attached to the completion.
pub const JSON_OPENER: &str = "{";

/// Default extraction prompt.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Document:\n```{document}```\nJSON schema:\n```\n{schema}\n```\nA JSON representation of the text document above that follows the JSON schema is:\n```\n{";

/// Fill `template` (or the default) with the document and schema.
///
/// The schema is substituted first so that document text which happens to
/// contain a placeholder is left untouched.
pub fn extraction_prompt(template: Option<&str>, document: &str, schema: &str) -> String {
    template
        .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
        .replacen(SCHEMA_PLACEHOLDER, schema, 1)
        .replacen(DOCUMENT_PLACEHOLDER, document, 1)
}

/// First `max_chars` characters of a prompt, for log previews.
pub fn preview(prompt: &str, max_chars: usize) -> String {
    match prompt.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &prompt[..cut]),
        None => prompt.to_string(),
    }
}
