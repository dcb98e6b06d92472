//! Buffered and streaming calls against the remote inference endpoint.
//!
//! The adapter is constructed once from configuration and shared by the
//! route handlers. Model identifiers are opaque here: whatever the caller
//! names is forwarded unchanged, and validity is the upstream's problem.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::RelayError;
use crate::provider::openai::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Usage,
};
use crate::sse::SseDecoder;

/// Parameters of one generation call, already validated and defaulted.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

/// What the adapter's streaming mode yields.
///
/// Exactly one terminal (`Done` or `Error`) ends every stream.
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// A text fragment from the upstream stream.
    Delta(String),
    /// The upstream stream finished normally.
    Done,
    /// The upstream stream failed mid-flight.
    Error(String),
}

/// Result of a buffered (non-streaming) generation.
#[derive(Debug)]
pub struct BufferedGeneration {
    pub text: String,
    pub usage: Usage,
}

/// Uniform call surface over one configured OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ProviderAdapter {
    http: reqwest::Client,
    chat_url: String,
    api_key: String,
}

impl ProviderAdapter {
    pub fn new(upstream: &UpstreamConfig, api_key: String) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .user_agent(&upstream.user_agent)
            .build()
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            chat_url: upstream.chat_completions_url(),
            api_key,
        })
    }

    fn request_body(&self, params: &GenerationParams, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: params.model.clone(),
            messages: vec![ChatMessage::user(&params.prompt)],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream,
        }
    }

    async fn post_chat(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response, RelayError> {
        let resp = self
            .http
            .post(&self.chat_url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_else(|e| e.to_string());
            return Err(RelayError::UpstreamError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// Buffered mode: one request, one completed text plus usage summary.
    pub async fn generate(&self, params: &GenerationParams) -> Result<BufferedGeneration, RelayError> {
        let resp = self.post_chat(&self.request_body(params, false)).await?;
        let completion: ChatCompletionResponse = resp.json().await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::MalformedResponse("response carried no choices".into()))?;

        Ok(BufferedGeneration {
            text: choice.message.content,
            usage: completion.usage.unwrap_or_default(),
        })
    }

    /// Streaming mode: a single-pass, non-restartable sequence of fragments.
    ///
    /// HTTP-level failures surface as `Err` before any event; once the stream
    /// is open, failures arrive as a terminal [`UpstreamEvent::Error`].
    pub async fn stream(
        &self,
        params: &GenerationParams,
    ) -> Result<mpsc::Receiver<UpstreamEvent>, RelayError> {
        let resp = self.post_chat(&self.request_body(params, true)).await?;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(run_upstream_stream(resp, tx));
        Ok(rx)
    }

    /// Streaming mode without any decoding: the raw upstream response.
    pub async fn stream_raw(&self, params: &GenerationParams) -> Result<reqwest::Response, RelayError> {
        self.post_chat(&self.request_body(params, true)).await
    }
}

/// Drain the upstream SSE body into the event channel.
async fn run_upstream_stream(resp: reqwest::Response, tx: mpsc::Sender<UpstreamEvent>) {
    let mut body = resp.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut fragments = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(UpstreamEvent::Error(e.to_string())).await;
                return;
            }
        };

        for payload in decoder.push_chunk(&chunk) {
            let Some((delta, finished)) = parse_stream_payload(&payload) else {
                continue;
            };
            if let Some(text) = delta {
                fragments += 1;
                // A closed receiver means the caller went away; stop reading.
                if tx.send(UpstreamEvent::Delta(text)).await.is_err() {
                    return;
                }
            }
            if finished {
                debug!(fragments, "Upstream stream finished");
                let _ = tx.send(UpstreamEvent::Done).await;
                return;
            }
        }
    }

    // Body exhausted without an explicit terminator; treat as completion.
    debug!(fragments, "Upstream stream closed without [DONE]");
    let _ = tx.send(UpstreamEvent::Done).await;
}

/// Interpret one SSE payload: `(text delta, stream finished)`.
///
/// Malformed payloads are logged and skipped (`None`), never fatal.
fn parse_stream_payload(payload: &str) -> Option<(Option<String>, bool)> {
    if payload.trim() == "[DONE]" {
        return Some((None, true));
    }
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => {
            let choice = chunk.choices.into_iter().next()?;
            Some((choice.delta.content, choice.finish_reason.is_some()))
        }
        Err(e) => {
            warn!(error = %e, payload, "Skipping malformed stream payload");
            None
        }
    }
}
