//! Language-model completion client.
//!
//! Talks to any server implementing the OpenAI chat-completions API:
//! - Ollama (`http://localhost:11434`)
//! - vLLM, llama.cpp server, etc.
//!
//! The [`CompletionService`] contract is deliberately blocking: callers own
//! the decision of which worker thread the multi-second completion runs on
//! (the semantic router uses `spawn_blocking`), and the cooperative
//! scheduler itself never issues the HTTP call.

use crate::config::LlmConfig;
use crate::error::{AssistantError, Result};
use tracing::debug;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Wire-format role string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a completion request.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Completion service consumed by the semantic router.
///
/// Implementations must be shareable across the session; the router holds
/// one instance for its whole lifetime. `complete` may block.
pub trait CompletionService: Send + Sync {
    /// Run one completion over the given messages and return the raw text.
    ///
    /// # Errors
    ///
    /// `LlmConnection` when the endpoint cannot be reached or refuses the
    /// request; `LlmResponse` when it answers with an unreadable body.
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat-completions client for an Ollama-style endpoint.
pub struct OllamaChat {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OllamaChat {
    /// Client for the configured general-purpose chat model.
    #[must_use]
    pub fn new(config: &LlmConfig) -> Self {
        Self::with_model(config, &config.model)
    }

    /// Client for the configured routing model (typically much smaller).
    #[must_use]
    pub fn router(config: &LlmConfig) -> Self {
        Self::with_model(config, &config.router_model)
    }

    /// Client for an explicit model name.
    #[must_use]
    pub fn with_model(config: &LlmConfig, model: &str) -> Self {
        Self {
            agent: ureq::agent(),
            base_url: config.base_url(),
            model: model.to_owned(),
            temperature: config.temperature,
        }
    }

    /// Override the endpoint base URL (used by tests against a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl CompletionService for OllamaChat {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let wire_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let body = serde_json::json!({
            "model": self.model,
            "messages": wire_messages,
            "stream": false,
            "temperature": self.temperature,
        });

        let url = self.completions_url();
        debug!("requesting completion from {url} (model={})", self.model);

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| AssistantError::LlmConnection(format!("chat request failed: {e}")))?;

        let raw = response
            .into_string()
            .map_err(|e| AssistantError::LlmResponse(format!("unreadable response body: {e}")))?;

        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| AssistantError::LlmResponse(format!("malformed response JSON: {e}")))?;

        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AssistantError::LlmResponse(
                    "response missing choices[0].message.content".to_owned(),
                )
            })?;

        Ok(content.to_owned())
    }
}
