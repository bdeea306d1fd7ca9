//! Shared application state.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::relay::Relay;
use crate::session::SessionStore;
use crate::settings::Settings;

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session persistence.
    pub store: Arc<SessionStore>,
    /// Chat orchestrator.
    pub relay: Relay,
    /// Application settings.
    pub settings: Arc<Settings>,
    /// The one session chat requests operate on. Store and relay take
    /// explicit ids; only the HTTP surface tracks which one is current.
    active_session: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(store: Arc<SessionStore>, relay: Relay, settings: Arc<Settings>) -> Self {
        Self {
            store,
            relay,
            settings,
            active_session: Arc::new(RwLock::new(None)),
        }
    }

    /// Id of the currently active session, if any.
    pub async fn active_session_id(&self) -> Option<String> {
        self.active_session.read().await.clone()
    }

    /// Make a session current (or clear with `None`).
    pub async fn set_active_session(&self, id: Option<String>) {
        *self.active_session.write().await = id;
    }

    /// Clear the active session only if it is the given id.
    pub async fn clear_active_if(&self, id: &str) {
        let mut active = self.active_session.write().await;
        if active.as_deref() == Some(id) {
            *active = None;
        }
    }
}
