//! OpenAI backend (Variant A): fixed provider endpoint, bearer required.

use async_trait::async_trait;
use reqwest::Client;

use crate::session::Message;

use super::error::{BackendError, BackendResult};
use super::{
    COMPLETE_TIMEOUT, ChatBackend, FragmentReceiver, SIMPLE_TIMEOUT, STREAM_TIMEOUT, build_messages,
    chat_payload, http_client, open_fragment_stream, request_completion, simple_payload,
};

/// The provider URL is not negotiable for this variant.
const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Backend targeting the hosted OpenAI chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Create the backend. The bearer credential is mandatory.
    pub fn new(model: &str, api_key: &str) -> BackendResult<Self> {
        if api_key.trim().is_empty() {
            return Err(BackendError::config("openai backend requires an api key"));
        }
        Ok(Self {
            client: http_client()?,
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<String> {
        let messages = build_messages(system_prompt, history, message);
        let payload = chat_payload(&self.model, &messages, false);
        request_completion(
            self.client
                .post(CHAT_COMPLETIONS_URL)
                .bearer_auth(&self.api_key)
                .timeout(COMPLETE_TIMEOUT)
                .json(&payload),
        )
        .await
    }

    async fn stream(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<FragmentReceiver> {
        let messages = build_messages(system_prompt, history, message);
        let payload = chat_payload(&self.model, &messages, true);
        open_fragment_stream(
            self.client
                .post(CHAT_COMPLETIONS_URL)
                .bearer_auth(&self.api_key)
                .timeout(STREAM_TIMEOUT)
                .json(&payload),
        )
        .await
    }

    async fn simple_complete(&self, prompt: &str) -> BackendResult<String> {
        let payload = simple_payload(&self.model, prompt);
        request_completion(
            self.client
                .post(CHAT_COMPLETIONS_URL)
                .bearer_auth(&self.api_key)
                .timeout(SIMPLE_TIMEOUT)
                .json(&payload),
        )
        .await
    }
}
