//! CompanionModel trait — the abstraction over the external LLM endpoint.
//!
//! The orchestrator calls `reply()` without knowing which provider backs it.
//! The production implementation lives in `warmline-provider`; tests use
//! in-process stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::turn::{ConversationTurn, Role};

/// One role/content pair in a model request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// The external completion endpoint, seen as an opaque collaborator.
///
/// This is the orchestrator's sole network/suspend point. Implementations
/// must bound the request with a timeout and must never retry on their own.
#[async_trait]
pub trait CompanionModel: Send + Sync {
    /// A human-readable name for this backend (e.g. "groq", "stub").
    fn name(&self) -> &str;

    /// Send the assembled context and return the reply text, failing on
    /// non-success responses, malformed payloads, or empty content.
    async fn reply(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_from_turn_copies_role_and_content() {
        let turn = ConversationTurn::user("good morning");
        let msg = ChatMessage::from(&turn);
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "good morning");
    }

    #[test]
    fn wire_shape_matches_completion_payload() {
        let msg = ChatMessage::system("You are Luna");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "You are Luna");
    }
}
