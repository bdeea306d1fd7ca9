//! Chat orchestration.
//!
//! Coordinates session reads/writes around a backend call, emits a
//! normalized event stream to the caller, and schedules the fire-and-forget
//! naming job. Owns the fallback policy: a streaming call that is disabled
//! or fails degrades exactly once to the non-streaming path.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::backend::{BackendError, ChatBackend};
use crate::naming::{NamingJob, NamingQueue};
use crate::session::{Role, Session, SessionStore, StoreError};

/// Buffer size for the outbound event channel.
const EVENT_BUFFER: usize = 32;

/// Number of messages a session has right after its first exchange.
const FIRST_EXCHANGE_LEN: usize = 2;

/// Normalized events delivered to the HTTP surface during a streamed chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// One incremental piece of assistant text.
    Chunk(String),
    /// The exchange completed and was persisted.
    Done,
    /// The exchange failed; nothing was persisted.
    Error(String),
}

/// Errors surfaced by relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Orchestrator for chat requests against explicit sessions.
#[derive(Clone)]
pub struct Relay {
    store: Arc<SessionStore>,
    backend: Arc<dyn ChatBackend>,
    naming: Option<NamingQueue>,
    streaming_enabled: bool,
}

impl Relay {
    pub fn new(
        store: Arc<SessionStore>,
        backend: Arc<dyn ChatBackend>,
        naming: Option<NamingQueue>,
        streaming_enabled: bool,
    ) -> Self {
        Self {
            store,
            backend,
            naming,
            streaming_enabled,
        }
    }

    /// Non-streaming chat: complete, persist both sides, return the reply.
    pub async fn chat(&self, session_id: &str, text: &str) -> Result<String, RelayError> {
        let session = self.store.load(session_id).await?;
        let reply = self
            .backend
            .complete(text, &session.messages, &session.system_prompt)
            .await?;

        let updated = self.persist_exchange(session_id, text, &reply).await?;
        self.maybe_submit_naming(&updated, text, &reply);
        Ok(reply)
    }

    /// Streaming chat. Returns a finite event channel: zero or more
    /// `Chunk`s terminated by `Done` or `Error`. An unknown session id
    /// fails here, before any event is produced.
    pub async fn chat_stream(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<mpsc::Receiver<ChatEvent>, RelayError> {
        let session = self.store.load(session_id).await?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let relay = self.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            relay.run_stream(session, text, tx).await;
        });
        Ok(rx)
    }

    async fn run_stream(&self, session: Session, text: String, tx: mpsc::Sender<ChatEvent>) {
        let mut reply = String::new();
        let mut need_fallback = !self.streaming_enabled;

        if !need_fallback {
            match self
                .backend
                .stream(&text, &session.messages, &session.system_prompt)
                .await
            {
                Ok(mut fragments) => {
                    while let Some(item) = fragments.recv().await {
                        match item {
                            Ok(chunk) => {
                                reply.push_str(&chunk);
                                if tx.send(ChatEvent::Chunk(chunk)).await.is_err() {
                                    // Client went away; abandon the exchange.
                                    return;
                                }
                            }
                            Err(err) => {
                                warn!("stream failed mid-exchange, falling back: {err}");
                                need_fallback = true;
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!("stream call failed, falling back: {err}");
                    need_fallback = true;
                }
            }
        }

        if need_fallback {
            match self
                .backend
                .complete(&text, &session.messages, &session.system_prompt)
                .await
            {
                Ok(full) => {
                    reply.push_str(&full);
                    if tx.send(ChatEvent::Chunk(full)).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(ChatEvent::Error(err.to_string())).await;
                    return;
                }
            }
        }

        let updated = match self.persist_exchange(&session.id, &text, &reply).await {
            Ok(updated) => updated,
            Err(err) => {
                let _ = tx.send(ChatEvent::Error(err.to_string())).await;
                return;
            }
        };

        let _ = tx.send(ChatEvent::Done).await;
        self.maybe_submit_naming(&updated, &text, &reply);
    }

    /// Persist user and assistant messages; the returned session reflects
    /// both appends.
    async fn persist_exchange(
        &self,
        session_id: &str,
        user: &str,
        assistant: &str,
    ) -> Result<Session, StoreError> {
        self.store
            .append_message(session_id, Role::User, user)
            .await?;
        self.store
            .append_message(session_id, Role::Assistant, assistant)
            .await
    }

    /// Fire the naming job only on the exact transition to a completed
    /// first exchange, and only while the name is still the placeholder.
    /// Both conditions are checked by value, not a one-shot flag.
    fn maybe_submit_naming(&self, session: &Session, user: &str, assistant: &str) {
        let Some(queue) = &self.naming else { return };
        if session.messages.len() == FIRST_EXCHANGE_LEN && session.has_placeholder_name() {
            queue.submit(NamingJob {
                session_id: session.id.clone(),
                user: user.to_string(),
                assistant: assistant.to_string(),
            });
        }
    }
}
