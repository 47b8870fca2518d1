//! Entitlement — the credit balance gating whether a principal may send.
//!
//! Every principal holds exactly one `EntitlementRecord`. New principals
//! start with [`INITIAL_CREDITS`] free messages; each successful send costs
//! one credit. Purchases add a credit pack or flip the unlimited flag.
//!
//! Invariants:
//! - `credits` is never negative (`u32` by construction) and is never
//!   decremented while `is_unlimited` is set.
//! - `has_purchased`, once true, never reverts.
//! - Running out of credits is a *business state* ([`CreditOutcome::Exhausted`]),
//!   not an error; storage failures are errors and fail the send closed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::principal::Principal;

/// Free message credits granted to a brand-new principal.
pub const INITIAL_CREDITS: u32 = 25;

/// Credits added by the purchasable 100-message pack.
pub const CREDITS_100_PACK: u32 = 100;

/// The per-principal credit/entitlement state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Remaining message credits. Meaningless while `is_unlimited` is set.
    pub credits: u32,

    /// Unlimited subscription — credits are never decremented.
    pub is_unlimited: bool,

    /// Whether this principal has ever completed a purchase. Gates premium
    /// personalities. Never reverts to false.
    pub has_purchased: bool,

    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl EntitlementRecord {
    /// The default record created on a principal's first interaction.
    pub fn starting() -> Self {
        Self {
            credits: INITIAL_CREDITS,
            is_unlimited: false,
            has_purchased: false,
            updated_at: Utc::now(),
        }
    }

    /// Whether this record permits sending another message.
    pub fn can_send(&self) -> bool {
        self.is_unlimited || self.credits > 0
    }
}

impl Default for EntitlementRecord {
    fn default() -> Self {
        Self::starting()
    }
}

/// Result of a credit mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "credits")]
pub enum CreditOutcome {
    /// Credits remaining after the operation.
    Remaining(u32),
    /// Principal has unlimited access; nothing was changed.
    Unlimited,
    /// No credits left; nothing was changed. Surfaced as a paywall.
    Exhausted,
}

/// The authoritative store of per-principal credit state.
///
/// Implementations: in-memory session store (anonymous principals, tests)
/// and SQLite (authenticated principals). All mutations are fully persisted
/// before the call returns — a caller never observes a partial write.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Current entitlement state, creating and persisting the default
    /// starting record if none exists.
    async fn entitlement(&self, principal: &Principal)
    -> Result<EntitlementRecord, StoreError>;

    /// Whether the principal may send another message.
    async fn can_send(&self, principal: &Principal) -> Result<bool, StoreError> {
        Ok(self.entitlement(principal).await?.can_send())
    }

    /// Spend one credit. Unlimited principals are untouched; an exhausted
    /// balance is reported, not an error, and leaves the record unchanged.
    async fn consume_one(&self, principal: &Principal) -> Result<CreditOutcome, StoreError>;

    /// Add purchased credits and mark the principal as having purchased.
    /// No-op (`Unlimited`) for unlimited principals.
    async fn grant_credits(
        &self,
        principal: &Principal,
        amount: u32,
    ) -> Result<CreditOutcome, StoreError>;

    /// Flip the unlimited flag (and `has_purchased`). Idempotent.
    async fn grant_unlimited(&self, principal: &Principal) -> Result<(), StoreError>;

    /// Explicit data-reset: drop the record entirely. The next touch
    /// recreates the starting balance.
    async fn reset(&self, principal: &Principal) -> Result<(), StoreError>;
}
