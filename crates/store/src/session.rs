//! In-memory backend — anonymous principals and tests.
//!
//! State lives for the lifetime of the process, which is the policy for
//! anonymous device principals: no durable record exists server-side, and
//! nothing survives a restart. A `tokio::sync::RwLock` per map serializes
//! conflicting writes, so concurrent `consume_one` calls for one principal
//! never lose updates.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use warmline_core::{
    ConversationLog, ConversationTurn, CreditOutcome, EntitlementRecord, EntitlementStore,
    PersonaConfig, PersonaStore, PersonaUpdate, Principal, Role, StoreError,
};

/// A session-scoped store holding entitlement, persona, and conversation
/// state in memory.
#[derive(Default)]
pub struct SessionStore {
    entitlements: Arc<RwLock<HashMap<String, EntitlementRecord>>>,
    personas: Arc<RwLock<HashMap<String, PersonaConfig>>>,
    logs: Arc<RwLock<HashMap<String, Vec<ConversationTurn>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntitlementStore for SessionStore {
    async fn entitlement(
        &self,
        principal: &Principal,
    ) -> Result<EntitlementRecord, StoreError> {
        let mut entitlements = self.entitlements.write().await;
        Ok(entitlements
            .entry(principal.key())
            .or_insert_with(EntitlementRecord::starting)
            .clone())
    }

    async fn consume_one(&self, principal: &Principal) -> Result<CreditOutcome, StoreError> {
        let mut entitlements = self.entitlements.write().await;
        let record = entitlements
            .entry(principal.key())
            .or_insert_with(EntitlementRecord::starting);

        if record.is_unlimited {
            return Ok(CreditOutcome::Unlimited);
        }
        if record.credits == 0 {
            return Ok(CreditOutcome::Exhausted);
        }

        record.credits -= 1;
        record.updated_at = Utc::now();
        Ok(CreditOutcome::Remaining(record.credits))
    }

    async fn grant_credits(
        &self,
        principal: &Principal,
        amount: u32,
    ) -> Result<CreditOutcome, StoreError> {
        let mut entitlements = self.entitlements.write().await;
        let record = entitlements
            .entry(principal.key())
            .or_insert_with(EntitlementRecord::starting);

        if record.is_unlimited {
            return Ok(CreditOutcome::Unlimited);
        }

        record.credits = record.credits.saturating_add(amount);
        record.has_purchased = true;
        record.updated_at = Utc::now();
        Ok(CreditOutcome::Remaining(record.credits))
    }

    async fn grant_unlimited(&self, principal: &Principal) -> Result<(), StoreError> {
        let mut entitlements = self.entitlements.write().await;
        let record = entitlements
            .entry(principal.key())
            .or_insert_with(EntitlementRecord::starting);
        record.is_unlimited = true;
        record.has_purchased = true;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn reset(&self, principal: &Principal) -> Result<(), StoreError> {
        self.entitlements.write().await.remove(&principal.key());
        Ok(())
    }
}

#[async_trait]
impl ConversationLog for SessionStore {
    async fn append(
        &self,
        principal: &Principal,
        role: Role,
        content: &str,
    ) -> Result<ConversationTurn, StoreError> {
        let mut logs = self.logs.write().await;
        let log = logs.entry(principal.key()).or_default();

        let mut turn = ConversationTurn::new(role, content);
        // Timestamps must be strictly increasing within one log.
        if let Some(last) = log.last() {
            if turn.created_at <= last.created_at {
                turn.created_at = last.created_at + Duration::microseconds(1);
            }
        }
        log.push(turn.clone());
        Ok(turn)
    }

    async fn recent_turns(
        &self,
        principal: &Principal,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let logs = self.logs.read().await;
        let log = match logs.get(&principal.key()) {
            Some(log) => log,
            None => return Ok(Vec::new()),
        };
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }

    async fn clear(&self, principal: &Principal) -> Result<(), StoreError> {
        self.logs.write().await.remove(&principal.key());
        Ok(())
    }
}

#[async_trait]
impl PersonaStore for SessionStore {
    async fn persona(&self, principal: &Principal) -> Result<PersonaConfig, StoreError> {
        let personas = self.personas.read().await;
        Ok(personas
            .get(&principal.key())
            .cloned()
            .unwrap_or_default())
    }

    async fn save(
        &self,
        principal: &Principal,
        update: PersonaUpdate,
    ) -> Result<PersonaConfig, StoreError> {
        let mut personas = self.personas.write().await;
        let current = personas
            .entry(principal.key())
            .or_insert_with(PersonaConfig::default);
        *current = current.merged(&update);
        Ok(current.clone())
    }

    async fn reset(&self, principal: &Principal) -> Result<(), StoreError> {
        self.personas.write().await.remove(&principal.key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warmline_core::INITIAL_CREDITS;

    fn anon() -> Principal {
        Principal::Device("test-device".into())
    }

    #[tokio::test]
    async fn first_touch_creates_starting_record() {
        let store = SessionStore::new();
        let record = store.entitlement(&anon()).await.unwrap();
        assert_eq!(record.credits, INITIAL_CREDITS);
        assert!(store.can_send(&anon()).await.unwrap());
    }

    #[tokio::test]
    async fn consume_decrements_until_exhausted() {
        let store = SessionStore::new();
        let p = anon();
        for expected in (0..INITIAL_CREDITS).rev() {
            assert_eq!(
                store.consume_one(&p).await.unwrap(),
                CreditOutcome::Remaining(expected)
            );
        }
        assert_eq!(store.consume_one(&p).await.unwrap(), CreditOutcome::Exhausted);
        // Repeated failed attempts leave the record unchanged.
        assert_eq!(store.consume_one(&p).await.unwrap(), CreditOutcome::Exhausted);
        assert_eq!(store.entitlement(&p).await.unwrap().credits, 0);
    }

    #[tokio::test]
    async fn grant_credits_sets_purchase_flag() {
        let store = SessionStore::new();
        let p = anon();
        for _ in 0..22 {
            store.consume_one(&p).await.unwrap();
        }
        assert_eq!(store.entitlement(&p).await.unwrap().credits, 3);

        let outcome = store.grant_credits(&p, 100).await.unwrap();
        assert_eq!(outcome, CreditOutcome::Remaining(103));
        let record = store.entitlement(&p).await.unwrap();
        assert!(record.has_purchased);
        assert!(!record.is_unlimited);
    }

    #[tokio::test]
    async fn unlimited_is_idempotent_and_never_decrements() {
        let store = SessionStore::new();
        let p = anon();
        store.grant_unlimited(&p).await.unwrap();
        store.grant_unlimited(&p).await.unwrap();

        for _ in 0..1000 {
            assert_eq!(store.consume_one(&p).await.unwrap(), CreditOutcome::Unlimited);
        }
        let record = store.entitlement(&p).await.unwrap();
        assert!(record.is_unlimited);
        assert!(record.has_purchased);
        assert_eq!(record.credits, INITIAL_CREDITS);

        // Granting a pack on top of unlimited is a no-op.
        assert_eq!(
            store.grant_credits(&p, 100).await.unwrap(),
            CreditOutcome::Unlimited
        );
    }

    #[tokio::test]
    async fn reset_restores_starting_balance() {
        let store = SessionStore::new();
        let p = anon();
        store.consume_one(&p).await.unwrap();
        EntitlementStore::reset(&store, &p).await.unwrap();
        assert_eq!(store.entitlement(&p).await.unwrap().credits, INITIAL_CREDITS);
    }

    #[tokio::test]
    async fn log_appends_in_order_and_clears() {
        let store = SessionStore::new();
        let p = anon();
        store.append(&p, Role::User, "hey").await.unwrap();
        store.append(&p, Role::Assistant, "hi!").await.unwrap();
        store.append(&p, Role::User, "how are you").await.unwrap();

        let turns = store.recent_turns(&p, 10).await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].content, "hey");
        assert_eq!(turns[2].content, "how are you");
        assert!(turns.windows(2).all(|w| w[0].created_at < w[1].created_at));

        store.clear(&p).await.unwrap();
        assert!(store.recent_turns(&p, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_turns_returns_tail_oldest_first() {
        let store = SessionStore::new();
        let p = anon();
        for i in 0..30 {
            store.append(&p, Role::User, &format!("msg {i}")).await.unwrap();
        }
        let turns = store.recent_turns(&p, 20).await.unwrap();
        assert_eq!(turns.len(), 20);
        assert_eq!(turns[0].content, "msg 10");
        assert_eq!(turns[19].content, "msg 29");
    }

    #[tokio::test]
    async fn persona_defaults_and_partial_update() {
        let store = SessionStore::new();
        let p = anon();
        assert_eq!(store.persona(&p).await.unwrap().companion_name, "Luna");

        let update = PersonaUpdate {
            backstory: Some("We met hiking.".into()),
            ..PersonaUpdate::default()
        };
        let merged = store.save(&p, update).await.unwrap();
        assert_eq!(merged.backstory, "We met hiking.");
        assert_eq!(merged.companion_name, "Luna");

        PersonaStore::reset(&store, &p).await.unwrap();
        assert_eq!(
            store.persona(&p).await.unwrap().backstory,
            PersonaConfig::default().backstory
        );
    }

    #[tokio::test]
    async fn principals_do_not_share_state() {
        let store = SessionStore::new();
        let a = Principal::Device("a".into());
        let b = Principal::Device("b".into());
        store.consume_one(&a).await.unwrap();
        store.append(&a, Role::User, "only for a").await.unwrap();

        assert_eq!(store.entitlement(&b).await.unwrap().credits, INITIAL_CREDITS);
        assert!(store.recent_turns(&b, 10).await.unwrap().is_empty());
    }
}
