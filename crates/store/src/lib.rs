//! Store implementations for Warmline.
//!
//! One backend per principal-kind policy:
//! - [`SessionStore`] — in-memory, session-scoped. Anonymous principals and
//!   tests.
//! - [`SqliteStore`] — durable, sqlx-backed. Authenticated principals.
//!
//! Both implement the same three core traits (`EntitlementStore`,
//! `ConversationLog`, `PersonaStore`), so the call site picks a backend by
//! principal kind instead of branching inside the chat flow.

pub mod session;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use session::SessionStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
