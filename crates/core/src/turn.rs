//! Conversation turns — the immutable records that make up a chat log.
//!
//! A turn is one message (user or assistant) in a principal's conversation.
//! Turns are never mutated after creation; the log is append-only, ordered
//! by `created_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The companion persona
    Assistant,
    /// Persona instructions — only ever appears in model payloads, never in
    /// a stored conversation log
    System,
}

impl Role {
    /// The wire/database representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse a stored role string. Unknown values fall back to `User` —
    /// the log only ever contains user/assistant rows.
    pub fn parse(s: &str) -> Role {
        match s {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

/// A single immutable message in a principal's conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Unique turn ID
    pub id: Uuid,

    /// Who sent this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn was appended
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a new turn stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}
