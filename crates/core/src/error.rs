//! Error types for the Warmline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Warmline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Billing errors ---
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    // --- Chat flow errors ---
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned no reply content")]
    EmptyReply,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Billing not configured: {0}")]
    NotConfigured(String),

    #[error("Checkout request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed checkout response: {0}")]
    MalformedResponse(String),
}

/// Errors (and signaled business conditions) raised by the chat flow.
///
/// `Exhausted` and `Locked` are not failures in the operational sense — they
/// are defined business states the UI surfaces as a paywall. They live here
/// so the orchestrator can reject a send through one channel.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    InvalidInput,

    #[error("No message credits remaining")]
    Exhausted,

    #[error("Personality '{0}' requires a purchase")]
    Locked(String),

    #[error("Unknown personality: {0}")]
    UnknownPersonality(String),

    #[error("Upstream model failure: {0}")]
    Upstream(#[from] ProviderError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::Api {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn chat_error_wraps_store_failures() {
        let err = ChatError::from(StoreError::Storage("disk unplugged".into()));
        assert!(err.to_string().contains("disk unplugged"));
    }

    #[test]
    fn locked_error_names_the_personality() {
        let err = ChatError::Locked("tsundere".into());
        assert!(err.to_string().contains("tsundere"));
    }
}
