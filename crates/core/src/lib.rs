//! # Warmline Core
//!
//! Domain types, traits, and error definitions for the Warmline companion
//! chat service. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping store backends by principal kind (ephemeral session vs durable)
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod catalog;
pub mod entitlement;
pub mod error;
pub mod log;
pub mod model;
pub mod persona;
pub mod principal;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use catalog::{PersonalityEntry, TextingStyleEntry, personality, texting_style};
pub use entitlement::{
    CREDITS_100_PACK, CreditOutcome, EntitlementRecord, EntitlementStore, INITIAL_CREDITS,
};
pub use error::{BillingError, ChatError, Error, ProviderError, Result, StoreError};
pub use log::ConversationLog;
pub use model::{ChatMessage, CompanionModel};
pub use persona::{PersonaConfig, PersonaStore, PersonaUpdate};
pub use principal::Principal;
pub use turn::{ConversationTurn, Role};
