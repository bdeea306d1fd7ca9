//! Session and message data models.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt. Only appears on the wire, never in stored history.
    System,
    /// Message written by the user.
    User,
    /// Message produced by the LLM backend.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Message text, arbitrary UTF-8.
    pub content: String,
    /// Creation time (RFC 3339), immutable.
    pub timestamp: String,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// A persisted chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque stable identifier, assigned at creation, never changes.
    pub id: String,
    /// Display label. Starts out equal to `id` until renamed.
    pub name: String,
    /// System prompt fixed at creation.
    pub system_prompt: String,
    /// When the session was created (RFC 3339).
    pub created_at: String,
    /// Refreshed on every load or mutation (RFC 3339).
    pub last_active: String,
    /// Conversation history, insertion order significant.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    /// Create a fresh session whose name is its id.
    pub fn new(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let id = id.into();
        let now = Utc::now().to_rfc3339();
        Self {
            name: id.clone(),
            id,
            system_prompt: system_prompt.into(),
            created_at: now.clone(),
            last_active: now,
            messages: Vec::new(),
        }
    }

    /// Whether the session still carries its placeholder name.
    pub fn has_placeholder_name(&self) -> bool {
        self.name == self.id
    }

    /// Summary view for listings.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at.clone(),
            last_active: self.last_active.clone(),
            message_count: self.messages.len(),
        }
    }
}

/// Lightweight session listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub last_active: String,
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::System, Role::User, Role::Assistant] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_session_uses_id_as_name() {
        let session = Session::new("1700000000000", "be helpful");
        assert_eq!(session.name, session.id);
        assert!(session.has_placeholder_name());
        assert!(session.messages.is_empty());
    }

    #[test]
    fn test_summary_counts_messages() {
        let mut session = Session::new("1", "");
        session.messages.push(Message::now(Role::User, "hi"));
        session.messages.push(Message::now(Role::Assistant, "hello"));
        assert_eq!(session.summary().message_count, 2);
    }
}
