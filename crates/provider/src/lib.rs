//! OpenAI-compatible completion client.
//!
//! Works with Groq (the default endpoint), OpenAI, OpenRouter, Ollama, and
//! any other provider exposing a `/chat/completions` endpoint. The client is
//! the chat flow's only network collaborator: one POST per send, a bounded
//! timeout, and no retries — a failed call surfaces as an upstream error and
//! the send is treated as not having happened.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use warmline_core::{ChatMessage, CompanionModel, ProviderError, Role};
use warmline_config::ModelConfig;

/// A client for an OpenAI-compatible chat-completion endpoint.
pub struct CompletionClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl CompletionClient {
    /// Create a new client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            temperature,
            client,
        }
    }

    /// Build a client from model configuration. `None` when no API key is
    /// configured — the caller decides how to surface that.
    pub fn from_config(config: &ModelConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(
            "groq",
            config.base_url.clone(),
            api_key,
            config.model.clone(),
            config.max_tokens,
            config.temperature,
            config.timeout_secs,
        ))
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl CompanionModel for CompletionClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(messages),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        debug!(provider = %self.name, model = %self.model, messages = messages.len(),
            "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::Api {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyReply);
        }

        Ok(content)
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiReplyMessage,
}

#[derive(Deserialize)]
struct ApiReplyMessage {
    #[serde(default)]
    content: Option<String>,
}
