//! llama.cpp server adapter.
//!
//! Talks to `llama-server` (or any server exposing the same `/tokenize` and
//! `/completion` endpoints). Completions are requested with `stream: true`;
//! the server answers with server-sent events, one JSON object per `data:`
//! line, the last one carrying `"stop": true`.

use crate::engine::{CompletionChunk, CompletionEngine, CompletionRequest, CompletionStream, Tokenizer};
use crate::error::{EngineError, RecordScrapeError};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::debug;

/// A llama.cpp HTTP server.
#[derive(Debug, Clone)]
pub struct LlamaServerEngine {
    client: reqwest::Client,
    base_url: String,
    model: Option<String>,
}

impl LlamaServerEngine {
    /// Where `llama-server` listens by default.
    pub const DEFAULT_URL: &'static str = "http://127.0.0.1:8080";

    /// Create an engine for the server at `base_url`.
    ///
    /// `request_timeout_secs` bounds each whole request, including a full
    /// streamed completion on a slow CPU-only model.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout_secs: u64,
    ) -> Result<Self, RecordScrapeError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RecordScrapeError::EngineNotConfigured {
                engine: "llama".into(),
                hint: format!("'{base_url}' is not an HTTP/HTTPS URL"),
            });
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| RecordScrapeError::EngineNotConfigured {
                engine: "llama".into(),
                hint: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: None,
        })
    }

    /// Name recorded in result snapshots instead of the server URL.
    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Ask the server which model it has loaded.
    ///
    /// Returns `Ok(None)` when the server is reachable but does not say; an
    /// unreachable server is an error.
    pub async fn detect_model(&self) -> Result<Option<String>, EngineError> {
        let url = self.endpoint("props");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Http {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            debug!("{} returned HTTP {}", url, response.status());
            return Ok(None);
        }

        let props: serde_json::Value = response.json().await.map_err(|e| EngineError::Protocol(e.to_string()))?;
        let model = props
            .get("model_path")
            .or_else(|| props.pointer("/default_generation_settings/model"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(model)
    }
}

#[derive(Serialize)]
struct TokenizeBody<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct TokenizeReply {
    tokens: Vec<u32>,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    prompt: &'a str,
    n_predict: usize,
    temperature: f32,
    stop: &'a [String],
    stream: bool,
    cache_prompt: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionEvent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
    #[serde(default)]
    stopped_limit: bool,
    #[serde(default)]
    stop_type: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl CompletionEvent {
    fn into_chunk(self) -> Result<CompletionChunk, EngineError> {
        if let Some(error) = self.error {
            return Err(EngineError::Protocol(format!("server error: {error}")));
        }
        if !self.stop {
            return Ok(CompletionChunk::text(self.content));
        }
        let limited = self.stopped_limit || self.stop_type.as_deref() == Some("limit");
        let reason = if limited { "length" } else { "stop" };
        Ok(CompletionChunk::finished(self.content, reason))
    }
}

/// Decode one line of a server-sent event stream.
///
/// Returns `None` for lines that carry no event (blank keep-alives, comments,
/// `event:` fields, the `[DONE]` sentinel).
fn parse_sse_line(line: &str) -> Option<Result<CompletionChunk, EngineError>> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let event = serde_json::from_str::<CompletionEvent>(payload)
        .map_err(|e| EngineError::Protocol(format!("bad event '{payload}': {e}")));
    Some(event.and_then(CompletionEvent::into_chunk))
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

struct EventDecoder {
    bytes: ByteStream,
    url: String,
    buffer: Vec<u8>,
    pending: VecDeque<Result<CompletionChunk, EngineError>>,
    finished: bool,
}

impl EventDecoder {
    /// Move every complete line from the byte buffer into `pending`.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = parse_sse_line(&String::from_utf8_lossy(&line)) {
                self.pending.push_back(item);
            }
        }
    }
}

fn decode_events(bytes: ByteStream, url: String) -> CompletionStream {
    let decoder = EventDecoder {
        bytes,
        url,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(decoder, |mut d| async move {
        loop {
            if let Some(item) = d.pending.pop_front() {
                return Some((item, d));
            }
            if d.finished {
                return None;
            }
            match d.bytes.next().await {
                Some(Ok(bytes)) => {
                    d.buffer.extend_from_slice(&bytes);
                    d.drain_lines();
                }
                Some(Err(e)) => {
                    d.finished = true;
                    let err = EngineError::Http {
                        url: d.url.clone(),
                        detail: e.to_string(),
                    };
                    return Some((Err(err), d));
                }
                None => {
                    // Flush a final event that lacks a trailing newline.
                    d.finished = true;
                    d.buffer.push(b'\n');
                    d.drain_lines();
                }
            }
        }
    }))
}

#[async_trait]
impl Tokenizer for LlamaServerEngine {
    async fn tokenize(&self, text: &str) -> Result<Vec<u32>, EngineError> {
        let url = self.endpoint("tokenize");
        let response = self
            .client
            .post(&url)
            .json(&TokenizeBody { content: text })
            .send()
            .await
            .map_err(|e| EngineError::Http {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let reply: TokenizeReply = response
            .json()
            .await
            .map_err(|e| EngineError::Protocol(format!("tokenize reply: {e}")))?;
        Ok(reply.tokens)
    }
}

#[async_trait]
impl CompletionEngine for LlamaServerEngine {
    fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| format!("llama.cpp@{}", self.base_url))
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionStream, EngineError> {
        let url = self.endpoint("completion");
        let body = CompletionBody {
            prompt: &request.prompt,
            n_predict: request.max_tokens,
            temperature: request.temperature,
            stop: &request.stop,
            stream: true,
            cache_prompt: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Http {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec())));
        let events = decode_events(bytes, url);

        if request.echo {
            let echoed: Result<CompletionChunk, EngineError> = Ok(CompletionChunk::text(request.prompt.clone()));
            Ok(Box::pin(stream::once(async move { echoed }).chain(events)))
        } else {
            Ok(events)
        }
    }
}
