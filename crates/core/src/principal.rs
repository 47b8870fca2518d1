//! Principal — the identity under which all companion state is scoped.
//!
//! A principal is either an anonymous device (state lives for the session)
//! or an authenticated account (state is durable). Exactly one entitlement
//! record, one persona config, and one conversation log exist per principal.
//! Device and account state never merge automatically.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity owning entitlement, persona, and conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Principal {
    /// Anonymous device identity — state is session-scoped, not durable.
    Device(String),
    /// Authenticated account — state is durably persisted.
    Account(Uuid),
}

impl Principal {
    /// The stable key this principal's records are stored under.
    pub fn key(&self) -> String {
        match self {
            Principal::Device(id) => format!("device:{id}"),
            Principal::Account(id) => format!("account:{id}"),
        }
    }

    /// Whether this principal's state belongs in durable storage.
    pub fn is_durable(&self) -> bool {
        matches!(self, Principal::Account(_))
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
