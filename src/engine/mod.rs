//! Completion engines: the language model, seen only through a tokenizer and
//! a streaming completion call.
//!
//! ```text
//!             ┌──────────────┐ tokenize(text) ──▶ [ids]
//! prompt ───▶ │ engine       │
//!             └──────────────┘ complete(req)  ──▶ chunk, chunk, …, chunk{finish}
//! ```
//!
//! Two adapters ship with the crate:
//!
//! * [`LlamaServerEngine`]: a llama.cpp HTTP server. Real tokenizer, real
//!   token-by-token streaming, native stop sequences. The natural fit for the
//!   completion-style prompt this crate uses.
//! * [`ProviderEngine`]: any chat provider supported by `edgequake-llm`
//!   (OpenAI, Anthropic, Gemini, Ollama, …). Token counts are approximated.
//!
//! Tests and embedders can implement [`CompletionEngine`] directly.

pub mod llama;
pub mod provider;

pub use llama::LlamaServerEngine;
pub use provider::{ApproxTokenizer, ProviderEngine};

use crate::error::EngineError;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::pin::Pin;
use tokio_stream::Stream;

/// A request for one streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Hard cap on generated tokens.
    pub max_tokens: usize,
    pub stop: Vec<String>,
    pub temperature: f32,
    /// Emit the prompt itself before the generated text.
    pub echo: bool,
}

/// An incremental piece of a completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionChunk {
    /// Text appended by this chunk.
    pub text: String,
    /// Set on the final chunk, e.g. `"stop"` or `"length"`.
    pub finish_reason: Option<String>,
}

impl CompletionChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: None,
        }
    }

    pub fn finished(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: Some(reason.into()),
        }
    }
}

/// A boxed stream of completion chunks.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionChunk, EngineError>> + Send>>;

/// Turns text into model token ids.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    async fn tokenize(&self, text: &str) -> Result<Vec<u32>, EngineError>;
}

/// A language model that can stream completions.
#[async_trait]
pub trait CompletionEngine: Tokenizer {
    /// Identifier recorded in every result's `model_options`.
    fn model_name(&self) -> String;

    /// Start a streamed completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionStream, EngineError>;
}

/// The assembled output of one completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub text: String,
    pub finish_reason: Option<String>,
    pub chunks: usize,
}

/// Drain `stream` until the first chunk carrying a finish reason.
///
/// Anything the engine sends after that chunk is ignored; a stream that ends
/// without a finish reason yields whatever text arrived.
pub async fn collect_completion(mut stream: CompletionStream) -> Result<Completion, EngineError> {
    let mut completion = Completion::default();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        completion.chunks += 1;
        completion.text.push_str(&chunk.text);
        if chunk.finish_reason.is_some() {
            completion.finish_reason = chunk.finish_reason;
            break;
        }
    }
    Ok(completion)
}
