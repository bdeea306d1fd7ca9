//! OpenAI-compatible backend (Variant B): locally configured base URL,
//! bearer optional. Covers LM Studio / Ollama style servers.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use crate::session::Message;

use super::error::{BackendError, BackendResult};
use super::{
    COMPLETE_TIMEOUT, ChatBackend, FragmentReceiver, SIMPLE_TIMEOUT, STREAM_TIMEOUT, build_messages,
    chat_payload, http_client, open_fragment_stream, request_completion, simple_payload,
};

/// Path suffix appended to the base URL when missing.
const CHAT_COMPLETIONS_SUFFIX: &str = "/chat/completions";

/// Backend targeting any server that speaks the chat-completions protocol.
#[derive(Debug, Clone)]
pub struct CompatBackend {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl CompatBackend {
    /// Create the backend against a configured base URL.
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> BackendResult<Self> {
        if endpoint.trim().is_empty() {
            return Err(BackendError::config(
                "compat backend requires an endpoint url",
            ));
        }
        let api_key = api_key.trim();
        Ok(Self {
            client: http_client()?,
            url: chat_completions_url(endpoint),
            model: model.to_string(),
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
        })
    }

    fn request(&self) -> RequestBuilder {
        let builder = self.client.post(&self.url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Append the chat-completions suffix if the configured URL lacks it.
fn chat_completions_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{CHAT_COMPLETIONS_SUFFIX}")
    }
}

#[async_trait]
impl ChatBackend for CompatBackend {
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<String> {
        let messages = build_messages(system_prompt, history, message);
        let payload = chat_payload(&self.model, &messages, false);
        request_completion(self.request().timeout(COMPLETE_TIMEOUT).json(&payload)).await
    }

    async fn stream(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<FragmentReceiver> {
        let messages = build_messages(system_prompt, history, message);
        let payload = chat_payload(&self.model, &messages, true);
        open_fragment_stream(self.request().timeout(STREAM_TIMEOUT).json(&payload)).await
    }

    async fn simple_complete(&self, prompt: &str) -> BackendResult<String> {
        let payload = simple_payload(&self.model, prompt);
        request_completion(self.request().timeout(SIMPLE_TIMEOUT).json(&payload)).await
    }
}
