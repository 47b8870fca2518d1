//! # Warmline Engine
//!
//! Deterministic prompt assembly, the persona configurator, and the
//! per-request chat orchestration that ties entitlement, conversation log,
//! and the external model together.

pub mod chat;
pub mod configurator;
pub mod prompt;

pub use chat::{ChatEngine, ChatReply, stateless_reply};
pub use configurator::{PersonaConfigurator, PersonaSaved};
pub use prompt::{FALLBACK_REPLY, HISTORY_LIMIT, build_instruction, build_request_context, greeting_for};
