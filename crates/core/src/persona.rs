//! Persona configuration — the user-editable identity shaping responses.
//!
//! Each principal owns one `PersonaConfig`: the companion's name, how she
//! addresses the user, which catalog personality is active, the shared
//! backstory, and the texting style. Updates are partial merges; renaming
//! the companion is defined to reset the conversation (handled by the
//! configurator in the engine crate, not the store).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::principal::Principal;

/// The persona parameters for one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// The companion's display name.
    pub companion_name: String,

    /// What the companion calls the user.
    pub user_alias: String,

    /// Active personality catalog id (e.g. "sweet", "tsundere").
    pub personality: String,

    /// Free-text shared backstory woven into the prompt.
    pub backstory: String,

    /// Texting style catalog id (casual, proper, cute, minimal).
    pub texting_style: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            companion_name: "Luna".into(),
            user_alias: "Babe".into(),
            personality: "sweet".into(),
            backstory: "We met at a coffee shop and have been dating for a few months.".into(),
            texting_style: "casual".into(),
        }
    }
}

impl PersonaConfig {
    /// Merge a partial update field-by-field; unspecified fields untouched.
    pub fn merged(&self, update: &PersonaUpdate) -> PersonaConfig {
        PersonaConfig {
            companion_name: update
                .companion_name
                .clone()
                .unwrap_or_else(|| self.companion_name.clone()),
            user_alias: update
                .user_alias
                .clone()
                .unwrap_or_else(|| self.user_alias.clone()),
            personality: update
                .personality
                .clone()
                .unwrap_or_else(|| self.personality.clone()),
            backstory: update
                .backstory
                .clone()
                .unwrap_or_else(|| self.backstory.clone()),
            texting_style: update
                .texting_style
                .clone()
                .unwrap_or_else(|| self.texting_style.clone()),
        }
    }
}

/// A partial persona update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backstory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texting_style: Option<String>,
}

impl PersonaUpdate {
    /// An update that only switches the personality.
    pub fn personality(id: impl Into<String>) -> Self {
        Self {
            personality: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Per-principal persisted persona configuration.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    /// Saved config, or the documented default if none exists.
    async fn persona(&self, principal: &Principal) -> Result<PersonaConfig, StoreError>;

    /// Merge and persist a partial update, returning the merged result.
    async fn save(
        &self,
        principal: &Principal,
        update: PersonaUpdate,
    ) -> Result<PersonaConfig, StoreError>;

    /// Drop the saved config; the next read returns the default.
    async fn reset(&self, principal: &Principal) -> Result<(), StoreError>;
}
