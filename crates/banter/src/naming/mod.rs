//! Background session auto-naming.
//!
//! The relay submits a job after a session's first completed exchange; a
//! single worker task drains the queue, asks the backend for a short
//! label, normalizes it, and renames the session. Failures are logged and
//! swallowed — naming never affects a chat response.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::session::SessionStore;

/// Queue capacity; jobs beyond this are dropped (the name just stays a
/// placeholder).
const QUEUE_CAPACITY: usize = 16;

/// How much of each side of the first exchange goes into the prompt.
const EXCERPT_CHARS: usize = 200;

/// Bounds on an accepted name.
const MIN_WORDS: usize = 2;
const MAX_WORDS: usize = 5;
const MAX_WORD_CHARS: usize = 15;

/// Models that leak reasoning wrap it in think tags; everything up to the
/// final closing tag is discarded.
const THINK_CLOSE: &str = "</think>";

/// Characters stripped from the edges of the raw reply and of each word.
const EDGE_PUNCTUATION: &[char] = &[
    '"', '\'', '`', '.', ',', ':', ';', '!', '?', '(', ')', '[', ']', '\u{201c}', '\u{201d}',
    '\u{2018}', '\u{2019}',
];

/// A request to name one session from its first exchange.
#[derive(Debug)]
pub struct NamingJob {
    pub session_id: String,
    pub user: String,
    pub assistant: String,
}

/// Handle for submitting naming jobs.
#[derive(Debug, Clone)]
pub struct NamingQueue {
    tx: mpsc::Sender<NamingJob>,
}

impl NamingQueue {
    /// Submit a job without waiting. A full or closed queue only costs the
    /// session its generated name.
    pub fn submit(&self, job: NamingJob) {
        let session_id = job.session_id.clone();
        if let Err(err) = self.tx.try_send(job) {
            warn!("dropping naming job for session {session_id}: {err}");
        }
    }
}

/// Spawn the naming worker and return its queue handle.
pub fn spawn_worker(
    store: Arc<SessionStore>,
    backend: Arc<dyn ChatBackend>,
    template: String,
) -> NamingQueue {
    let (tx, mut rx) = mpsc::channel::<NamingJob>(QUEUE_CAPACITY);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let session_id = job.session_id.clone();
            if let Err(err) = handle_job(&store, backend.as_ref(), &template, job).await {
                warn!("naming session {session_id} failed: {err:#}");
            }
        }
        debug!("naming worker stopped");
    });
    NamingQueue { tx }
}

/// Process one naming job end to end.
async fn handle_job(
    store: &SessionStore,
    backend: &dyn ChatBackend,
    template: &str,
    job: NamingJob,
) -> Result<()> {
    let session = store
        .load(&job.session_id)
        .await
        .context("loading session")?;
    if !session.has_placeholder_name() {
        // Renamed while the job sat in the queue.
        return Ok(());
    }

    let prompt = build_prompt(template, &job.user, &job.assistant);
    let raw = backend
        .simple_complete(&prompt)
        .await
        .context("requesting name")?;

    match normalize_name(&raw) {
        Some(name) => {
            store
                .rename(&job.session_id, &name)
                .await
                .context("renaming session")?;
            info!("named session {} -> {name}", job.session_id);
        }
        None => {
            debug!(
                "rejected generated name {raw:?} for session {}",
                job.session_id
            );
        }
    }
    Ok(())
}

fn build_prompt(template: &str, user: &str, assistant: &str) -> String {
    template
        .replace("{user}", &excerpt(user))
        .replace("{assistant}", &excerpt(assistant))
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

/// Normalize a raw model reply into an underscore-joined name, or reject
/// it. Accepts underscore-joined or space-joined multi-word forms; the
/// result must have 2-5 words of at most 15 alphanumeric characters each.
pub fn normalize_name(raw: &str) -> Option<String> {
    let text = raw
        .rsplit_once(THINK_CLOSE)
        .map(|(_, after)| after)
        .unwrap_or(raw);
    let text = text
        .trim()
        .trim_matches(|c: char| EDGE_PUNCTUATION.contains(&c))
        .trim()
        .to_lowercase();

    let words: Vec<&str> = text
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    if !(MIN_WORDS..=MAX_WORDS).contains(&words.len()) {
        return None;
    }

    let mut parts = Vec::with_capacity(words.len());
    for word in words {
        let word = word.trim_matches(|c: char| EDGE_PUNCTUATION.contains(&c));
        if word.is_empty()
            || word.chars().count() > MAX_WORD_CHARS
            || !word.chars().all(char::is_alphanumeric)
        {
            return None;
        }
        parts.push(word);
    }
    Some(parts.join("_"))
}
