//! Chat-provider adapter backed by `edgequake-llm`.
//!
//! Chat APIs neither expose their tokenizer nor continue a half-written
//! answer, so this adapter approximates both: token counts come from
//! [`ApproxTokenizer`], and the whole reply is delivered as a single chunk
//! with any opening code fence removed and the text cut at the first stop
//! sequence.

use crate::engine::{CompletionChunk, CompletionEngine, CompletionRequest, CompletionStream, Tokenizer};
use crate::error::{EngineError, RecordScrapeError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::stream;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default model when a provider is named without one.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

static RE_PIECE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+|[^\w\s]").unwrap());
static RE_OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```[A-Za-z]*[ \t]*\n?").unwrap());

/// Heuristic tokenizer for engines without a tokenize endpoint.
///
/// Punctuation counts one token; a word counts one token per four
/// characters, rounded up. Ids are positional and carry no meaning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenizer;

impl ApproxTokenizer {
    pub fn count(text: &str) -> usize {
        RE_PIECE
            .find_iter(text)
            .map(|m| {
                let chars = m.as_str().chars().count();
                if m.as_str().chars().all(|c| c.is_alphanumeric() || c == '_') {
                    chars.div_ceil(4)
                } else {
                    1
                }
            })
            .sum()
    }
}

#[async_trait]
impl Tokenizer for ApproxTokenizer {
    async fn tokenize(&self, text: &str) -> Result<Vec<u32>, EngineError> {
        Ok((0..Self::count(text) as u32).collect())
    }
}

/// A chat provider used as a completion engine.
#[derive(Clone)]
pub struct ProviderEngine {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl fmt::Debug for ProviderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEngine")
            .field("provider", &"<dyn LLMProvider>")
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderEngine {
    /// Wrap an already configured provider.
    pub fn from_provider(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Resolve a provider, from most to least specific:
    ///
    /// 1. an explicit `provider` name (with `model`, or the default model);
    /// 2. `EDGEQUAKE_LLM_PROVIDER` and `EDGEQUAKE_MODEL`, when both are set;
    /// 3. `OPENAI_API_KEY`, when set;
    /// 4. whatever [`ProviderFactory::from_env`] detects.
    pub fn resolve(provider: Option<&str>, model: Option<&str>) -> Result<Self, RecordScrapeError> {
        if let Some(name) = provider {
            let model = model.unwrap_or(DEFAULT_PROVIDER_MODEL);
            return Self::create(name, model);
        }

        if let (Ok(prov), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !model.is_empty() {
                return Self::create(&prov, &model);
            }
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                return Self::create("openai", model.unwrap_or(DEFAULT_PROVIDER_MODEL));
            }
        }

        let (llm, _embedding) =
            ProviderFactory::from_env().map_err(|e| RecordScrapeError::EngineNotConfigured {
                engine: "provider".into(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                    Error: {e}"
                ),
            })?;
        Ok(Self::from_provider(llm, model.unwrap_or("auto")))
    }

    fn create(name: &str, model: &str) -> Result<Self, RecordScrapeError> {
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            RecordScrapeError::EngineNotConfigured {
                engine: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::from_provider(provider, format!("{name}/{model}")))
    }
}

/// Shape a chat reply like a raw continuation of the prompt.
fn continuation(reply: &str, stop: &[String]) -> String {
    let body = RE_OPENING_FENCE.replace(reply, "");
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| body.find(s.as_str()))
        .min()
        .unwrap_or(body.len());
    body[..cut].to_string()
}

#[async_trait]
impl Tokenizer for ProviderEngine {
    async fn tokenize(&self, text: &str) -> Result<Vec<u32>, EngineError> {
        ApproxTokenizer.tokenize(text).await
    }
}

#[async_trait]
impl CompletionEngine for ProviderEngine {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionStream, EngineError> {
        let messages = vec![ChatMessage::user(request.prompt.as_str())];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| EngineError::Provider(e.to_string()))?;
        debug!(
            "{}: {} prompt tokens, {} completion tokens",
            self.model, response.prompt_tokens, response.completion_tokens
        );

        let mut text = continuation(&response.content, &request.stop);
        if request.echo {
            text.insert_str(0, &request.prompt);
        }
        let chunk = CompletionChunk::finished(text, "stop");
        Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_counts_words_and_punctuation() {
        assert_eq!(ApproxTokenizer::count(""), 0);
        assert_eq!(ApproxTokenizer::count("Dear customer,"), 1 + 2 + 1);
        assert_eq!(ApproxTokenizer::count("a b c"), 3);
    }

    #[tokio::test]
    async fn approx_tokenize_length_matches_count() {
        let ids = ApproxTokenizer.tokenize("NOTICE OF DATA BREACH").await.unwrap();
        assert_eq!(ids.len(), ApproxTokenizer::count("NOTICE OF DATA BREACH"));
    }

    #[test]
    fn continuation_strips_fence_and_cuts_at_stop() {
        let stop = vec!["```".to_string()];
        assert_eq!(
            continuation("```json\n{\"a\": 1}\n```\nanything", &stop),
            "{\"a\": 1}\n"
        );
        assert_eq!(continuation("\"a\": 1}", &stop), "\"a\": 1}");
    }

    #[test]
    fn continuation_without_stop_keeps_everything() {
        assert_eq!(continuation("{\"a\": 1}", &[]), "{\"a\": 1}");
    }
}
