//! LLM backend adapters.
//!
//! A normalized chat request (message + history + system prompt) is
//! translated into one of three upstream wire protocols, and the reply is
//! normalized back — both as one complete string and as an incremental
//! fragment stream. Message building and the chat-completions wire
//! plumbing shared by the OpenAI-style variants live here.

pub mod compat;
pub mod custom;
pub mod error;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use reqwest_eventsource::{Event as SseEvent, EventSource};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::session::Message;
use crate::settings::LlmSettings;

pub use compat::CompatBackend;
pub use custom::CustomBackend;
pub use error::{BackendError, BackendResult};
pub use openai::OpenAiBackend;

/// At most this many prior messages are forwarded upstream, regardless of
/// total history length. Hard token-budget guard, not configurable.
pub const HISTORY_WINDOW: usize = 20;

/// Sampling temperature for regular chat completions.
const COMPLETION_TEMPERATURE: f64 = 0.7;
/// Low temperature for auxiliary calls (session naming).
const SIMPLE_TEMPERATURE: f64 = 0.1;
/// Token budget for auxiliary calls.
const SIMPLE_MAX_TOKENS: u32 = 4000;
/// System prompt for auxiliary calls.
const SIMPLE_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Respond directly and concisely without thinking tags.";

/// End-of-stream sentinel in the chat-completions SSE protocol.
const DONE_SENTINEL: &str = "[DONE]";

/// Connect window for all upstream calls.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Overall deadline for auxiliary calls.
const SIMPLE_TIMEOUT: Duration = Duration::from_secs(30);
/// Overall deadline for a non-streaming completion.
const COMPLETE_TIMEOUT: Duration = Duration::from_secs(60);
/// Overall deadline for a streaming completion, first byte to last.
const STREAM_TIMEOUT: Duration = Duration::from_secs(90);

/// Buffer size for fragment channels.
const FRAGMENT_BUFFER: usize = 32;

/// Receiver half of a fragment stream. Finite, not restartable: the
/// channel closes when the upstream stream ends.
pub type FragmentReceiver = mpsc::Receiver<BackendResult<String>>;

/// A chat message in upstream wire shape.
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Interface implemented by every backend variant.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// One-shot completion for a chat turn.
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<String>;

    /// Incremental completion for a chat turn. Returns `Err` if the call
    /// fails before producing any fragment; failures after that are
    /// delivered through the channel.
    async fn stream(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<FragmentReceiver>;

    /// Low-temperature completion with no history, for auxiliary tasks.
    async fn simple_complete(&self, prompt: &str) -> BackendResult<String>;
}

/// Build a backend from configuration. Fails with
/// [`BackendError::Config`] on an unsupported kind.
pub fn from_settings(llm: &LlmSettings) -> BackendResult<Arc<dyn ChatBackend>> {
    match llm.backend.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiBackend::new(&llm.model, &llm.api_key)?)),
        "compat" | "lmstudio" | "ollama" => Ok(Arc::new(CompatBackend::new(
            &llm.endpoint,
            &llm.model,
            &llm.api_key,
        )?)),
        "custom" => Ok(Arc::new(CustomBackend::new(
            &llm.endpoint,
            &llm.model,
            &llm.headers,
        )?)),
        other => Err(BackendError::config(format!(
            "unsupported backend kind: {other}"
        ))),
    }
}

/// Assemble the outbound message set: `[system] + history[-20:] + [user]`.
pub fn build_messages(
    system_prompt: &str,
    history: &[Message],
    user_message: &str,
) -> Vec<WireMessage> {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut messages = Vec::with_capacity(history.len() - start + 2);
    messages.push(WireMessage::new("system", system_prompt));
    for msg in &history[start..] {
        messages.push(WireMessage::new(msg.role.to_string(), msg.content.clone()));
    }
    messages.push(WireMessage::new("user", user_message));
    messages
}

/// Shared HTTP client for backend adapters.
fn http_client() -> BackendResult<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|err| BackendError::config(format!("http client: {err}")))
}

/// Chat-completions request body.
fn chat_payload(model: &str, messages: &[WireMessage], stream: bool) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": messages,
        "temperature": COMPLETION_TEMPERATURE,
    });
    if stream {
        payload["stream"] = json!(true);
    }
    payload
}

/// Chat-completions request body for auxiliary calls.
fn simple_payload(model: &str, prompt: &str) -> Value {
    let messages = [
        WireMessage::new("system", SIMPLE_SYSTEM_PROMPT),
        WireMessage::new("user", prompt),
    ];
    json!({
        "model": model,
        "messages": messages,
        "temperature": SIMPLE_TEMPERATURE,
        "max_tokens": SIMPLE_MAX_TOKENS,
    })
}

/// Send a non-streaming chat-completions request and pull the assistant
/// text out of the reply.
async fn request_completion(builder: RequestBuilder) -> BackendResult<String> {
    let response = builder.send().await?;
    let response = response.error_for_status()?;
    let body: Value = response
        .json()
        .await
        .map_err(|err| BackendError::protocol(format!("decoding completion reply: {err}")))?;
    extract_message_content(&body)
}

/// `choices[0].message.content` of a chat-completions reply.
fn extract_message_content(body: &Value) -> BackendResult<String> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::protocol("reply is missing choices[0].message.content"))
}

/// `choices[0].delta.content` of a streaming chunk, if any.
fn extract_delta(value: &Value) -> Option<&str> {
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
}

/// Open a chat-completions SSE stream and forward its text deltas through
/// a channel. The connection is established before this returns, so a
/// network or status failure surfaces as `Err` rather than as a fragment.
async fn open_fragment_stream(builder: RequestBuilder) -> BackendResult<FragmentReceiver> {
    let mut source = EventSource::new(builder)
        .map_err(|err| BackendError::transport(format!("opening event stream: {err}")))?;

    // Drive until the connection is open; the first event is either Open
    // or a connection-level error.
    loop {
        match source.next().await {
            Some(Ok(SseEvent::Open)) => break,
            Some(Ok(SseEvent::Message(_))) => {
                source.close();
                return Err(BackendError::protocol("event before stream open"));
            }
            Some(Err(err)) => {
                source.close();
                return Err(map_stream_error(err));
            }
            None => return Err(BackendError::protocol("stream ended before open")),
        }
    }

    let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
    tokio::spawn(forward_deltas(source, tx));
    Ok(rx)
}

/// Drain the event source, pushing text deltas into the channel until the
/// sentinel, the stream end, or a failure.
async fn forward_deltas(mut source: EventSource, tx: mpsc::Sender<BackendResult<String>>) {
    while let Some(event) = source.next().await {
        match event {
            Ok(SseEvent::Open) => {}
            Ok(SseEvent::Message(msg)) => {
                let data = msg.data.trim();
                if data == DONE_SENTINEL {
                    break;
                }
                let value: Value = match serde_json::from_str(data) {
                    Ok(value) => value,
                    // Malformed frames are skipped, not fatal.
                    Err(err) => {
                        debug!("skipping malformed stream frame: {err}");
                        continue;
                    }
                };
                if let Some(error) = value.get("error") {
                    let _ = tx
                        .send(Err(BackendError::protocol(format!(
                            "upstream error in stream: {error}"
                        ))))
                        .await;
                    break;
                }
                if let Some(delta) = extract_delta(&value) {
                    if !delta.is_empty() && tx.send(Ok(delta.to_string())).await.is_err() {
                        // Consumer went away; stop pulling.
                        break;
                    }
                }
            }
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(err) => {
                warn!("stream failed mid-flight: {err}");
                let _ = tx.send(Err(map_stream_error(err))).await;
                break;
            }
        }
    }
    source.close();
}

fn map_stream_error(err: reqwest_eventsource::Error) -> BackendError {
    use reqwest_eventsource::Error;
    match err {
        Error::InvalidStatusCode(status, _) => {
            BackendError::transport(format!("upstream returned {status}"))
        }
        Error::Transport(err) => BackendError::transport(err),
        other => BackendError::protocol(other),
    }
}
