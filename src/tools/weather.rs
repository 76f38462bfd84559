//! Weather lookup via wttr.in.

use crate::error::{AssistantError, Result};
use crate::tools::{Tool, ToolOutput, text_arg};
use async_trait::async_trait;
use tracing::error;

/// One-line weather report for a city.
pub struct WeatherTool {
    agent: ureq::Agent,
}

impl WeatherTool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::agent(),
        }
    }

    fn fetch_weather(&self, city: &str) -> Result<String> {
        let url = format!("https://wttr.in/{}?format=3", urlencoding::encode(city));
        let report = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| AssistantError::Tool(format!("weather request failed: {e}")))?
            .into_string()
            .map_err(|e| AssistantError::Tool(format!("weather body unreadable: {e}")))?;
        Ok(report.trim().to_owned())
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn description(&self) -> &'static str {
        "perguntas sobre clima ou previsão do tempo."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("cidade.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(city) = text_arg(args.as_ref()) else {
            return Ok(ToolOutput::text(
                "Claro, para qual cidade você gostaria da previsão do tempo?",
            ));
        };

        let agent = self.agent.clone();
        let city_for_worker = city.clone();
        let report = tokio::task::spawn_blocking(move || {
            Self { agent }.fetch_weather(&city_for_worker)
        })
        .await
        .unwrap_or_else(|e| Err(AssistantError::Task(format!("weather worker: {e}"))));

        match report {
            Ok(report) => Ok(ToolOutput::text(report)),
            Err(e) => {
                error!("failed to fetch weather for '{city}': {e}");
                Ok(ToolOutput::text(format!(
                    "Desculpe, não consegui obter a previsão do tempo para {city}."
                )))
            }
        }
    }
}
