//! Document trimming: normalise whitespace and shrink a document until it fits
//! the model's token budget.
//!
//! Shrinking removes text from the *middle-end* of the document: the last
//! `keep_tail_tokens` whitespace tokens are always kept, and blocks of tokens
//! immediately before them are dropped one step at a time. Notification
//! letters put the facts being extracted (dates, counts, contact details)
//! either in the opening paragraphs or in the closing block, so both ends
//! survive as long as possible.

use crate::config::TrimConfig;
use crate::engine::Tokenizer;
use crate::error::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\t ]+").unwrap());

/// Result of trimming one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrimOutcome {
    /// Cleaned, possibly shortened, document text.
    pub text: String,
    /// Token count of `text` under the engine's tokenizer.
    pub token_count: usize,
    /// Shrink steps performed.
    pub iterations: usize,
    /// The budget could not be met; `text` is the best effort.
    pub exhausted: bool,
}

/// Normalise whitespace and drop degenerate lines.
///
/// Newline runs become one newline, horizontal whitespace runs one space.
/// Lines that are blank, or longer than `max_line_chars` characters, are
/// removed.
pub fn clean_document(text: &str, cfg: &TrimConfig) -> String {
    let collapsed = RE_NEWLINES.replace_all(text, "\n");
    let collapsed = RE_HSPACE.replace_all(&collapsed, " ");
    collapsed
        .trim()
        .split('\n')
        .filter(|line| !line.trim().is_empty() && line.chars().count() <= cfg.max_line_chars)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One shrink step: drop the block of tokens right before the tail.
///
/// Returns `None` when nothing can be removed.
fn shrink_once(text: &str, cfg: &TrimConfig) -> Option<String> {
    let tokens: Vec<&str> = RE_HSPACE.split(text).collect();
    if tokens.len() <= cfg.keep_tail_tokens {
        return None;
    }
    let tail_start = tokens.len() - cfg.keep_tail_tokens;
    let head_end = tail_start.saturating_sub(cfg.drop_block_tokens);
    let kept: Vec<&str> = tokens[..head_end]
        .iter()
        .chain(&tokens[tail_start..])
        .copied()
        .collect();
    Some(kept.join(" "))
}

/// Clean `text` and shrink it until `tokenizer` counts at most `max_tokens`.
///
/// Never fails on an over-long document: after `cfg.max_iterations` steps (or
/// when only the tail is left) the best-effort text is returned with
/// [`TrimOutcome::exhausted`] set. Only tokenizer failures are errors.
pub async fn trim_to_budget<T: Tokenizer + ?Sized>(
    text: &str,
    tokenizer: &T,
    max_tokens: usize,
    cfg: &TrimConfig,
) -> Result<TrimOutcome, EngineError> {
    let mut cleaned = clean_document(text, cfg);
    let mut token_count = tokenizer.tokenize(&cleaned).await?.len();
    let mut iterations = 0;

    while token_count > max_tokens && iterations < cfg.max_iterations {
        let Some(shorter) = shrink_once(&cleaned, cfg) else {
            break;
        };
        iterations += 1;
        cleaned = shorter;
        token_count = tokenizer.tokenize(&cleaned).await?.len();
    }

    let exhausted = token_count > max_tokens;
    if exhausted {
        warn!(
            "Document still {} tokens after {} trim steps (budget {})",
            token_count, iterations, max_tokens
        );
    } else if iterations > 0 {
        debug!(
            "Trimmed document to {} tokens in {} steps, {} chars",
            token_count,
            iterations,
            cleaned.len()
        );
    }

    Ok(TrimOutcome {
        text: cleaned,
        token_count,
        iterations,
        exhausted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// One token per whitespace-separated word.
    struct WordTokenizer;

    #[async_trait]
    impl Tokenizer for WordTokenizer {
        async fn tokenize(&self, text: &str) -> Result<Vec<u32>, EngineError> {
            Ok(text.split_whitespace().map(|_| 0).collect())
        }
    }

    struct BrokenTokenizer;

    #[async_trait]
    impl Tokenizer for BrokenTokenizer {
        async fn tokenize(&self, _text: &str) -> Result<Vec<u32>, EngineError> {
            Err(EngineError::Protocol("tokenizer offline".into()))
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn clean_collapses_whitespace_and_blank_lines() {
        let cfg = TrimConfig::default();
        let out = clean_document("  Dear\t\t customer,\n\n\n \nWe  regret\n  ", &cfg);
        assert_eq!(out, "Dear customer,\nWe regret");
    }

    #[test]
    fn clean_drops_long_lines() {
        let cfg = TrimConfig::default();
        let long = "x".repeat(101);
        let exact = "y".repeat(100);
        let out = clean_document(&format!("keep\n{long}\n{exact}"), &cfg);
        assert_eq!(out, format!("keep\n{exact}"));
    }

    #[test]
    fn shrink_drops_block_before_tail() {
        let cfg = TrimConfig {
            keep_tail_tokens: 2,
            drop_block_tokens: 2,
            ..TrimConfig::default()
        };
        assert_eq!(shrink_once("a b c d e f", &cfg).as_deref(), Some("a b e f"));
        assert_eq!(shrink_once("a b c", &cfg).as_deref(), Some("b c"));
        assert_eq!(shrink_once("a b", &cfg), None);
    }

    #[tokio::test]
    async fn within_budget_is_untouched() {
        let out = trim_to_budget("one two three", &WordTokenizer, 10, &TrimConfig::default())
            .await
            .unwrap();
        assert_eq!(out.text, "one two three");
        assert_eq!(out.iterations, 0);
        assert!(!out.exhausted);
    }

    #[tokio::test]
    async fn shrinks_to_budget_and_keeps_tail() {
        let doc = words(120);
        let out = trim_to_budget(&doc, &WordTokenizer, 80, &TrimConfig::default())
            .await
            .unwrap();
        assert!(out.token_count <= 80);
        assert!(!out.exhausted);
        assert_eq!(out.iterations, 8);
        let tail = (70..120).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        assert!(out.text.ends_with(&tail));
        assert!(out.text.starts_with("w0 w1"));
    }

    #[tokio::test]
    async fn iteration_cap_flags_exhaustion() {
        let cfg = TrimConfig {
            max_iterations: 3,
            ..TrimConfig::default()
        };
        let out = trim_to_budget(&words(200), &WordTokenizer, 60, &cfg).await.unwrap();
        assert_eq!(out.iterations, 3);
        assert_eq!(out.token_count, 185);
        assert!(out.exhausted);
    }

    #[tokio::test]
    async fn tail_only_text_stops_early() {
        let out = trim_to_budget(&words(50), &WordTokenizer, 10, &TrimConfig::default())
            .await
            .unwrap();
        assert_eq!(out.text, words(50));
        assert!(out.exhausted);
    }

    #[tokio::test]
    async fn tokenizer_error_propagates() {
        let res = trim_to_budget("text", &BrokenTokenizer, 10, &TrimConfig::default()).await;
        assert!(res.is_err());
    }
}
