//! Persona configurator — user edits and their side effects.
//!
//! Two behaviors are part of the contract here, not the caller's problem:
//! - renaming the companion resets the conversation (starting over with a
//!   new persona): the log is cleared and the greeting re-seeded;
//! - selecting a premium personality is gated on the principal having
//!   purchased (or holding unlimited access).

use std::sync::Arc;
use tracing::info;

use warmline_core::{
    ChatError, ConversationLog, ConversationTurn, EntitlementStore, PersonaConfig, PersonaStore,
    PersonaUpdate, Principal, Role, personality,
};

use crate::prompt::greeting_for;

/// The result of a persona save: the merged config, plus the fresh greeting
/// turn when the edit reset the conversation.
#[derive(Debug, Clone)]
pub struct PersonaSaved {
    pub persona: PersonaConfig,
    pub greeting: Option<ConversationTurn>,
}

/// Applies persona edits and enforces catalog gating.
pub struct PersonaConfigurator<S> {
    store: Arc<S>,
}

impl<S> PersonaConfigurator<S>
where
    S: EntitlementStore + ConversationLog + PersonaStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The principal's current persona (or the documented default).
    pub async fn persona(&self, principal: &Principal) -> Result<PersonaConfig, ChatError> {
        Ok(self.store.persona(principal).await?)
    }

    /// Merge and persist a partial update.
    ///
    /// A companion-name change clears the conversation log and re-seeds the
    /// deterministic greeting, which is returned alongside the new config.
    pub async fn update(
        &self,
        principal: &Principal,
        update: PersonaUpdate,
    ) -> Result<PersonaSaved, ChatError> {
        let before = self.store.persona(principal).await?;
        let persona = self.store.save(principal, update).await?;

        let renamed = persona.companion_name != before.companion_name;
        let greeting = if renamed {
            info!(%principal, name = %persona.companion_name,
                "companion renamed; conversation reset");
            self.store.clear(principal).await?;
            let text = greeting_for(&persona.personality, &persona.user_alias);
            Some(
                ConversationLog::append(&*self.store, principal, Role::Assistant, &text).await?,
            )
        } else {
            None
        };

        Ok(PersonaSaved { persona, greeting })
    }

    /// Switch the active personality, enforcing the premium gate.
    ///
    /// A premium entry is locked unless the principal has purchased or holds
    /// unlimited access; a locked selection mutates nothing.
    pub async fn select_personality(
        &self,
        principal: &Principal,
        personality_id: &str,
    ) -> Result<PersonaSaved, ChatError> {
        let entry = personality(personality_id)
            .ok_or_else(|| ChatError::UnknownPersonality(personality_id.into()))?;

        if entry.is_premium {
            let entitlement = self.store.entitlement(principal).await?;
            if !entitlement.has_purchased && !entitlement.is_unlimited {
                return Err(ChatError::Locked(personality_id.into()));
            }
        }

        self.update(principal, PersonaUpdate::personality(personality_id))
            .await
    }

    /// Seed the deterministic greeting on a principal's first render.
    ///
    /// Appends one assistant turn chosen by personality id — no credit
    /// consumed, no model call. No-op when the log already has turns.
    pub async fn ensure_greeting(
        &self,
        principal: &Principal,
    ) -> Result<Option<ConversationTurn>, ChatError> {
        if !self.store.recent_turns(principal, 1).await?.is_empty() {
            return Ok(None);
        }
        let persona = self.store.persona(principal).await?;
        let greeting = greeting_for(&persona.personality, &persona.user_alias);
        let turn =
            ConversationLog::append(&*self.store, principal, Role::Assistant, &greeting).await?;
        Ok(Some(turn))
    }

    /// Explicit data-reset: entitlement back to the starting balance,
    /// persona back to defaults, conversation log emptied.
    pub async fn reset_all(&self, principal: &Principal) -> Result<(), ChatError> {
        self.store.clear(principal).await?;
        PersonaStore::reset(&*self.store, principal).await?;
        EntitlementStore::reset(&*self.store, principal).await?;
        info!(%principal, "all companion state reset");
        Ok(())
    }
}
