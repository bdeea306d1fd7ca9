//! Filesystem-backed session store.
//!
//! Every mutation is a read-modify-write of the session's JSON document,
//! flushed before the call returns. Renaming a session relocates its
//! backing file to `{sanitized_name}_{id}.json`, so id-to-path resolution
//! goes through an index rebuilt from a directory scan at startup.

use std::path::PathBuf;

use chrono::Utc;
use dashmap::DashMap;
use tokio::fs;
use tracing::{debug, warn};

use super::error::{StoreError, StoreResult};
use super::model::{Message, Role, Session, SessionSummary};

/// Maximum length of the sanitized name part of a session filename.
const MAX_FILENAME_STEM: usize = 50;

/// Store for persisted chat sessions.
#[derive(Debug)]
pub struct SessionStore {
    /// Directory holding one JSON document per session.
    dir: PathBuf,
    /// Session id to backing file path.
    index: DashMap<String, PathBuf>,
    /// Retention cap on stored messages per session.
    max_history: usize,
}

impl SessionStore {
    /// Open a store rooted at `dir`, creating the directory if needed and
    /// rebuilding the id index from the documents already present.
    pub async fn open(dir: impl Into<PathBuf>, max_history: usize) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let index = DashMap::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match fs::read_to_string(&path).await {
                    Ok(raw) => match serde_json::from_str::<Session>(&raw) {
                        Ok(session) => {
                            index.insert(session.id, path);
                        }
                        Err(err) => {
                            warn!("skipping unreadable session document {:?}: {}", path, err);
                        }
                    },
                    Err(err) => {
                        warn!("skipping unreadable session file {:?}: {}", path, err);
                    }
                }
            }
        }

        debug!("session store opened at {:?} ({} sessions)", dir, index.len());
        Ok(Self {
            dir,
            index,
            max_history,
        })
    }

    /// Create a new session and persist it immediately.
    pub async fn create(&self, system_prompt: impl Into<String>) -> StoreResult<Session> {
        let id = self.next_id();
        let session = Session::new(id, system_prompt);
        let path = self.dir.join(format!("{}.json", session.id));

        write_document(&path, &session).await?;
        self.index.insert(session.id.clone(), path);

        debug!("created session {}", session.id);
        Ok(session)
    }

    /// Load a session, refreshing its `last_active` timestamp on disk.
    pub async fn load(&self, id: &str) -> StoreResult<Session> {
        let mut session = self.read(id).await?;
        session.last_active = Utc::now().to_rfc3339();
        self.write(&session).await?;
        Ok(session)
    }

    /// List all sessions, most recently active first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let paths: Vec<(String, PathBuf)> = self
            .index
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut summaries = Vec::with_capacity(paths.len());
        for (id, path) in paths {
            match read_document(&path).await {
                Ok(session) => summaries.push(session.summary()),
                Err(err) => warn!("skipping session {} while listing: {}", id, err),
            }
        }

        // RFC 3339 UTC timestamps sort lexicographically.
        summaries.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        summaries
    }

    /// Delete a session and its backing file.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.path_for(id)?;
        fs::remove_file(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        self.index.remove(id);
        debug!("deleted session {}", id);
        Ok(())
    }

    /// Rename a session, relocating its backing file to a name derived from
    /// the sanitized label plus the immutable id.
    pub async fn rename(&self, id: &str, new_name: &str) -> StoreResult<()> {
        let old_path = self.path_for(id)?;
        let mut session = self.read(id).await?;
        session.name = new_name.to_string();
        session.last_active = Utc::now().to_rfc3339();

        let stem = sanitize_name(new_name);
        let new_path = if stem.is_empty() {
            self.dir.join(format!("{}.json", id))
        } else {
            self.dir.join(format!("{}_{}.json", stem, id))
        };

        write_document(&new_path, &session).await?;
        if new_path != old_path {
            fs::remove_file(&old_path).await?;
            debug!("relocated session file {:?} -> {:?}", old_path, new_path);
        }
        self.index.insert(id.to_string(), new_path);
        Ok(())
    }

    /// Append a message, enforcing the retention cap, and return the
    /// updated session.
    pub async fn append_message(
        &self,
        id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> StoreResult<Session> {
        let mut session = self.read(id).await?;
        session.messages.push(Message::now(role, content));
        if session.messages.len() > self.max_history {
            let excess = session.messages.len() - self.max_history;
            session.messages.drain(..excess);
        }
        session.last_active = Utc::now().to_rfc3339();
        self.write(&session).await?;
        Ok(session)
    }

    /// Replace the content of the message at `index`.
    pub async fn update_message(&self, id: &str, index: usize, content: &str) -> StoreResult<()> {
        let mut session = self.read(id).await?;
        let len = session.messages.len();
        let message = session
            .messages
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        message.content = content.to_string();
        session.last_active = Utc::now().to_rfc3339();
        self.write(&session).await
    }

    /// Remove up to `count` messages from the tail; returns how many were
    /// actually removed.
    pub async fn delete_last_messages(&self, id: &str, count: usize) -> StoreResult<usize> {
        let mut session = self.read(id).await?;
        let deleted = count.min(session.messages.len());
        let keep = session.messages.len() - deleted;
        session.messages.truncate(keep);
        session.last_active = Utc::now().to_rfc3339();
        self.write(&session).await?;
        Ok(deleted)
    }

    /// Remove all messages from a session.
    pub async fn clear(&self, id: &str) -> StoreResult<()> {
        let mut session = self.read(id).await?;
        session.messages.clear();
        session.last_active = Utc::now().to_rfc3339();
        self.write(&session).await
    }

    /// Whether a session with this id exists.
    pub fn exists(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Millisecond-timestamp id, bumped until unused so that creations in
    /// the same millisecond stay distinct.
    fn next_id(&self) -> String {
        let mut ts = Utc::now().timestamp_millis();
        while self.index.contains_key(&ts.to_string()) {
            ts += 1;
        }
        ts.to_string()
    }

    fn path_for(&self, id: &str) -> StoreResult<PathBuf> {
        self.index
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn read(&self, id: &str) -> StoreResult<Session> {
        let path = self.path_for(id)?;
        read_document(&path).await.map_err(|err| match err {
            StoreError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                StoreError::NotFound(id.to_string())
            }
            other => other,
        })
    }

    async fn write(&self, session: &Session) -> StoreResult<()> {
        let path = self.path_for(&session.id)?;
        write_document(&path, session).await
    }
}

async fn read_document(path: &PathBuf) -> StoreResult<Session> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn write_document(path: &PathBuf, session: &Session) -> StoreResult<()> {
    let body = serde_json::to_string_pretty(session)?;
    fs::write(path, body).await?;
    Ok(())
}

/// Reduce a display name to filesystem-safe characters: spaces become
/// underscores, anything outside `[A-Za-z0-9_-]` is dropped, length capped.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' || c == '/' || c == '\\' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_FILENAME_STEM)
        .collect()
}
