//! Random joke tool backed by JokeAPI.

use crate::error::{AssistantError, Result};
use crate::tools::{Tool, ToolOutput};
use async_trait::async_trait;
use tracing::error;

const JOKE_URL: &str = "https://v2.jokeapi.dev/joke/Any?lang=pt&blacklistFlags=nsfw,religious,political,racist,sexist,explicit";

/// Fetches a random Portuguese joke.
pub struct JokeTool {
    agent: ureq::Agent,
}

impl JokeTool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::agent(),
        }
    }

    fn fetch_joke(&self) -> Result<String> {
        let raw = self
            .agent
            .get(JOKE_URL)
            .call()
            .map_err(|e| AssistantError::Tool(format!("joke request failed: {e}")))?
            .into_string()
            .map_err(|e| AssistantError::Tool(format!("joke body unreadable: {e}")))?;

        let data: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| AssistantError::Tool(format!("joke response not JSON: {e}")))?;

        // Single-part jokes carry "joke"; two-part ones carry setup/delivery.
        if data["type"] == "single" {
            data["joke"]
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| AssistantError::Tool("joke response missing text".to_owned()))
        } else {
            match (data["setup"].as_str(), data["delivery"].as_str()) {
                (Some(setup), Some(delivery)) => Ok(format!("{setup} ... {delivery}")),
                _ => Err(AssistantError::Tool(
                    "joke response missing setup/delivery".to_owned(),
                )),
            }
        }
    }
}

impl Default for JokeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for JokeTool {
    fn name(&self) -> &'static str {
        "joke"
    }

    fn description(&self) -> &'static str {
        "pedidos de piada."
    }

    async fn invoke(&self, _args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let agent = self.agent.clone();
        let tool = Self { agent };
        let joke = tokio::task::spawn_blocking(move || tool.fetch_joke())
            .await
            .unwrap_or_else(|e| Err(AssistantError::Task(format!("joke worker: {e}"))));

        match joke {
            Ok(joke) => Ok(ToolOutput::text(joke)),
            Err(e) => {
                error!("failed to fetch joke: {e}");
                Ok(ToolOutput::text(
                    "Desculpe, não consegui buscar uma piada agora.",
                ))
            }
        }
    }
}
