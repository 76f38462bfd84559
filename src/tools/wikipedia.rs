//! Wikipedia definition lookups via the REST summary endpoint.

use crate::error::{AssistantError, Result};
use crate::tools::{Tool, ToolOutput, text_arg};
use async_trait::async_trait;
use tracing::error;

/// Summarizes a term from the configured-language Wikipedia.
pub struct WikipediaTool {
    agent: ureq::Agent,
    language: String,
}

/// Outcomes the summary endpoint can produce for a term.
enum SummaryLookup {
    Found(String),
    Missing,
    Ambiguous,
}

impl WikipediaTool {
    #[must_use]
    pub fn new(language: &str) -> Self {
        Self {
            agent: ureq::agent(),
            language: language.to_owned(),
        }
    }

    fn fetch_summary(&self, term: &str) -> Result<SummaryLookup> {
        let url = format!(
            "https://{}.wikipedia.org/api/rest_v1/page/summary/{}",
            self.language,
            urlencoding::encode(term)
        );

        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(SummaryLookup::Missing),
            Err(e) => {
                return Err(AssistantError::Tool(format!(
                    "wikipedia request failed: {e}"
                )));
            }
        };

        let raw = response
            .into_string()
            .map_err(|e| AssistantError::Tool(format!("wikipedia body unreadable: {e}")))?;
        let data: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| AssistantError::Tool(format!("wikipedia response not JSON: {e}")))?;

        if data["type"] == "disambiguation" {
            return Ok(SummaryLookup::Ambiguous);
        }

        match data["extract"].as_str() {
            Some(extract) if !extract.trim().is_empty() => {
                Ok(SummaryLookup::Found(extract.trim().to_owned()))
            }
            _ => Ok(SummaryLookup::Missing),
        }
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    fn description(&self) -> &'static str {
        "perguntas de definição, como \"o que é\" ou \"quem foi\"."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("termo a pesquisar.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(term) = text_arg(args.as_ref()) else {
            return Ok(ToolOutput::text(
                "Claro, o que você gostaria que eu pesquisasse?",
            ));
        };

        let agent = self.agent.clone();
        let language = self.language.clone();
        let term_for_worker = term.clone();
        let lookup = tokio::task::spawn_blocking(move || {
            Self {
                agent,
                language,
            }
            .fetch_summary(&term_for_worker)
        })
        .await
        .unwrap_or_else(|e| Err(AssistantError::Task(format!("wikipedia worker: {e}"))));

        match lookup {
            Ok(SummaryLookup::Found(summary)) => Ok(ToolOutput::text(summary)),
            Ok(SummaryLookup::Missing) => Ok(ToolOutput::text(format!(
                "Desculpe, não encontrei nenhum resultado para {term}."
            ))),
            Ok(SummaryLookup::Ambiguous) => Ok(ToolOutput::text(format!(
                "O termo {term} é muito vago. Por favor, seja mais específico."
            ))),
            Err(e) => {
                error!("wikipedia lookup for '{term}' failed: {e}");
                Ok(ToolOutput::text(
                    "Desculpe, ocorreu um erro ao pesquisar no Wikipedia.",
                ))
            }
        }
    }
}
