//! Custom backend (Variant C): posts a JSON envelope to a configured URL
//! with configured extra headers. The reply text is taken from the first
//! present field of a fixed ordered list; streaming degrades to a single
//! fragment carrying the complete reply.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::session::Message;

use super::error::{BackendError, BackendResult};
use super::{
    COMPLETE_TIMEOUT, ChatBackend, FragmentReceiver, HISTORY_WINDOW, SIMPLE_SYSTEM_PROMPT,
    SIMPLE_TIMEOUT, WireMessage, http_client,
};

/// Reply text is the first of these fields present in the response body.
const REPLY_FIELDS: [&str; 2] = ["response", "text"];

/// Backend posting an arbitrary JSON envelope to a configured endpoint.
#[derive(Debug, Clone)]
pub struct CustomBackend {
    client: Client,
    endpoint: String,
    model: String,
    headers: HeaderMap,
}

impl CustomBackend {
    /// Create the backend. Extra headers are validated up front.
    pub fn new(
        endpoint: &str,
        model: &str,
        headers: &HashMap<String, String>,
    ) -> BackendResult<Self> {
        if endpoint.trim().is_empty() {
            return Err(BackendError::config(
                "custom backend requires an endpoint url",
            ));
        }

        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| BackendError::config(format!("invalid header name {name}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| BackendError::config(format!("invalid header value: {err}")))?;
            header_map.insert(name, value);
        }

        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            headers: header_map,
        })
    }

    fn envelope(&self, message: &str, history: &[Message], system_prompt: &str) -> Value {
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        let history: Vec<WireMessage> = history[start..]
            .iter()
            .map(|m| WireMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();
        json!({
            "prompt": message,
            "history": history,
            "model": self.model,
            "system_prompt": system_prompt,
        })
    }

    async fn post(&self, envelope: &Value) -> BackendResult<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .timeout(COMPLETE_TIMEOUT)
            .json(envelope)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| BackendError::protocol(format!("decoding custom reply: {err}")))?;
        Ok(extract_reply(&body))
    }
}

/// First present reply field, else the whole body rendered as a string.
fn extract_reply(body: &Value) -> String {
    for field in REPLY_FIELDS {
        if let Some(text) = body.get(field).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    body.to_string()
}

#[async_trait]
impl ChatBackend for CustomBackend {
    async fn complete(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<String> {
        self.post(&self.envelope(message, history, system_prompt))
            .await
    }

    async fn stream(
        &self,
        message: &str,
        history: &[Message],
        system_prompt: &str,
    ) -> BackendResult<FragmentReceiver> {
        // This protocol has no streaming form; deliver the complete reply
        // as one fragment.
        let reply = self.complete(message, history, system_prompt).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(reply)).await;
        Ok(rx)
    }

    async fn simple_complete(&self, prompt: &str) -> BackendResult<String> {
        let envelope = json!({
            "prompt": prompt,
            "history": [],
            "model": self.model,
            "system_prompt": SIMPLE_SYSTEM_PROMPT,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .timeout(SIMPLE_TIMEOUT)
            .json(&envelope)
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| BackendError::protocol(format!("decoding custom reply: {err}")))?;
        Ok(extract_reply(&body))
    }
}
