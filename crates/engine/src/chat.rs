//! Chat orchestration — the per-request send flow.
//!
//! One send moves through: validate → persist user turn → invoke model →
//! persist assistant turn → consume credit. The model call is the only
//! suspend point; every failure before the credit step leaves the
//! entitlement untouched, so a send that fails is a send that never
//! happened (fail closed).
//!
//! The entitlement pre-check and the final `consume_one` can race across
//! concurrent sends for one principal. That race is tolerated by design:
//! the store's conditional decrement keeps the balance consistent, and a
//! losing request still delivers its reply while reporting `Exhausted`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use warmline_core::{
    ChatError, ChatMessage, CompanionModel, ConversationLog, ConversationTurn, CreditOutcome,
    EntitlementStore, PersonaConfig, PersonaStore, Principal, Role,
};

use crate::prompt::{HISTORY_LIMIT, build_request_context};

/// A successful send: the assistant's reply plus the post-send balance.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub reply: ConversationTurn,
    pub balance: CreditOutcome,
}

/// The conversation orchestrator, generic over a store backend that holds
/// all three per-principal records.
pub struct ChatEngine<S> {
    store: Arc<S>,
    model: Arc<dyn CompanionModel>,
}

impl<S> ChatEngine<S>
where
    S: EntitlementStore + ConversationLog + PersonaStore,
{
    pub fn new(store: Arc<S>, model: Arc<dyn CompanionModel>) -> Self {
        Self { store, model }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handle one user message end to end.
    ///
    /// Rejections (`InvalidInput`, `Exhausted`) happen before any state
    /// mutation. An upstream failure consumes no credit and persists no
    /// assistant turn; callers substitute [`crate::prompt::FALLBACK_REPLY`]
    /// for display only.
    pub async fn send(&self, principal: &Principal, text: &str) -> Result<ChatReply, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidInput);
        }
        if !self.store.can_send(principal).await? {
            debug!(%principal, "send rejected: no credits remaining");
            return Err(ChatError::Exhausted);
        }

        let persona = self.store.persona(principal).await?;
        let history = self.store.recent_turns(principal, HISTORY_LIMIT).await?;
        ConversationLog::append(&*self.store, principal, Role::User, text).await?;

        let context = build_request_context(&persona, &history, text, HISTORY_LIMIT);
        let reply_text = match self.model.reply(&context).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%principal, error = %e, "model call failed; no credit consumed");
                return Err(ChatError::Upstream(e));
            }
        };

        let reply =
            ConversationLog::append(&*self.store, principal, Role::Assistant, &reply_text).await?;
        let balance = self.store.consume_one(principal).await?;
        if balance == CreditOutcome::Exhausted {
            // Lost the pre-check/consume race. The reply stands; the UI
            // shows the paywall for the next send.
            info!(%principal, "credits exhausted during send");
        }

        Ok(ChatReply { reply, balance })
    }

}

/// One stateless reply: client-held history, no entitlement, no log.
///
/// This is the unauthenticated contract — the browser owns the transcript
/// and the credit state, and the server only assembles the prompt and
/// relays the model's reply.
pub async fn stateless_reply(
    model: &dyn CompanionModel,
    persona: &PersonaConfig,
    history: &[ChatMessage],
    new_message: &str,
) -> Result<String, ChatError> {
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    let mut context = Vec::with_capacity(history.len() - start + 2);
    context.push(ChatMessage::system(crate::prompt::build_instruction(persona)));
    context.extend_from_slice(&history[start..]);
    context.push(ChatMessage::user(new_message));

    Ok(model.reply(&context).await?)
}
