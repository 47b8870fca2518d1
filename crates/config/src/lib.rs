//! Configuration loading, validation, and management for Warmline.
//!
//! Loads configuration from `~/.warmline/config.toml` with environment
//! variable overrides for credentials. Validates all settings at load time.
//! Missing credentials are a detected condition surfaced by `doctor` and at
//! request time — never a silent failure.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.warmline/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Payment / checkout settings
    #[serde(default)]
    pub billing: BillingConfig,

    /// Gateway HTTP server settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// External completion endpoint configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key for the completion endpoint. Usually supplied via the
    /// `GROQ_API_KEY` / `WARMLINE_API_KEY` environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per companion reply. Replies are deliberately short.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds. The model call is the only suspend point
    /// in a send, so this bounds the whole request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Hosted checkout configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Payment provider secret key. Usually supplied via `STRIPE_SECRET_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Price id for the 100-message pack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_credits: Option<String>,

    /// Price id for the unlimited subscription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_unlimited: Option<String>,

    /// Origin used to build success/cancel redirect URLs.
    #[serde(default = "default_checkout_origin")]
    pub checkout_origin: String,
}

/// Gateway HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty means same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Durable storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path for authenticated principals.
    /// `":memory:"` gives an in-process ephemeral database.
    #[serde(default = "default_db_path")]
    pub sqlite_path: String,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_max_tokens() -> u32 {
    150
}
fn default_temperature() -> f32 {
    0.85
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_checkout_origin() -> String {
    "http://localhost:8787".into()
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8787
}
fn default_db_path() -> String {
    AppConfig::config_dir()
        .join("warmline.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            price_credits: None,
            price_unlimited: None,
            checkout_origin: default_checkout_origin(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_db_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            billing: BillingConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("billing", &self.billing)
            .field("gateway", &self.gateway)
            .field("storage", &self.storage)
            .finish()
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("secret_key", &redact(&self.secret_key))
            .field("price_credits", &self.price_credits)
            .field("price_unlimited", &self.price_unlimited)
            .field("checkout_origin", &self.checkout_origin)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.warmline/config.toml).
    ///
    /// Credential environment variables override the file:
    /// - `WARMLINE_API_KEY` then `GROQ_API_KEY` for the model endpoint
    /// - `STRIPE_SECRET_KEY` for checkout
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (highest priority).
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("WARMLINE_API_KEY").or_else(|| var("GROQ_API_KEY")) {
            self.model.api_key = Some(key);
        }
        if let Some(key) = var("STRIPE_SECRET_KEY") {
            self.billing.secret_key = Some(key);
        }
        if let Some(url) = var("WARMLINE_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(model) = var("WARMLINE_MODEL") {
            self.model.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".warmline")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "model.max_tokens must be positive".into(),
            ));
        }
        if self.model.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "model.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether a model API key is available (from config or environment).
    pub fn has_model_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Whether a payment secret key is available.
    pub fn has_billing_key(&self) -> bool {
        self.billing.secret_key.is_some()
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.max_tokens, 150);
        assert_eq!(config.model.model, "llama-3.3-70b-versatile");
        assert_eq!(config.gateway.port, 8787);
        assert!(!config.has_model_key());
        assert!(!config.has_billing_key());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.base_url, config.model.base_url);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/warmline.toml")).unwrap();
        assert_eq!(config.model.max_tokens, 150);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gateway]\nport = 9000").unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.model.temperature, 0.85);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\ntemperature = 5.0").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn env_overrides_beat_file_values() {
        let vars = |name: &str| match name {
            "GROQ_API_KEY" => Some("gsk_from_env".to_string()),
            "STRIPE_SECRET_KEY" => Some("sk_from_env".to_string()),
            "WARMLINE_BASE_URL" => Some("https://proxy.internal/v1".to_string()),
            "WARMLINE_MODEL" => Some("llama-3.1-8b-instant".to_string()),
            _ => None,
        };

        let mut config = AppConfig::default();
        config.model.api_key = Some("gsk_from_file".into());
        config.apply_overrides(vars);

        assert_eq!(config.model.api_key.as_deref(), Some("gsk_from_env"));
        assert_eq!(config.billing.secret_key.as_deref(), Some("sk_from_env"));
        assert_eq!(config.model.base_url, "https://proxy.internal/v1");
        assert_eq!(config.model.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn warmline_api_key_beats_groq_api_key() {
        let mut config = AppConfig::default();
        config.apply_overrides(|name| match name {
            "WARMLINE_API_KEY" => Some("generic_key".to_string()),
            "GROQ_API_KEY" => Some("groq_key".to_string()),
            _ => None,
        });
        assert_eq!(config.model.api_key.as_deref(), Some("generic_key"));
    }

    #[test]
    fn absent_env_leaves_file_values_alone() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("gsk_from_file".into());
        config.apply_overrides(|_| None);
        assert_eq!(config.model.api_key.as_deref(), Some("gsk_from_file"));
        assert_eq!(config.model.base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("gsk_super_secret".into());
        config.billing.secret_key = Some("sk_live_secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super_secret"));
        assert!(!debug.contains("sk_live"));
        assert!(debug.contains("[REDACTED]"));
    }
}
