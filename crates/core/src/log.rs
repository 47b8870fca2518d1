//! ConversationLog trait — append-only per-principal chat history.
//!
//! The log serves two purposes: transcript display and model context
//! reconstruction. Turns are immutable once appended and strictly ordered
//! by creation time. For anonymous principals the log lives only for the
//! session; authenticated principals get a durable log.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::principal::Principal;
use crate::turn::{ConversationTurn, Role};

/// Append-only ordered record of exchanged messages for a principal.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Append a turn, assigning its id and timestamp. Ordering relative to
    /// prior entries for the principal is strictly increasing.
    async fn append(
        &self,
        principal: &Principal,
        role: Role,
        content: &str,
    ) -> Result<ConversationTurn, StoreError>;

    /// Up to `limit` most recent turns in chronological (oldest-first)
    /// order. Empty for a new principal.
    async fn recent_turns(
        &self,
        principal: &Principal,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError>;

    /// Delete all turns for the principal. Irreversible.
    async fn clear(&self, principal: &Principal) -> Result<(), StoreError>;
}
