//! Web search via the DuckDuckGo instant-answer API.
//!
//! No API keys and no listener — a single JSON endpoint queried per search.
//! This is also the dispatcher's graceful-degradation target when the
//! semantic router answers with something unparseable: the user gets a
//! (possibly imperfect) search instead of a visible failure.

use crate::error::{AssistantError, Result};
use crate::speech::SpeechSynthesizer;
use crate::tools::{Tool, ToolOutput, text_arg};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Searches the web and answers with the best snippet found.
pub struct WebSearchTool {
    agent: ureq::Agent,
    voice: Arc<dyn SpeechSynthesizer>,
}

impl WebSearchTool {
    #[must_use]
    pub fn new(voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            agent: ureq::agent(),
            voice,
        }
    }

    fn fetch_answer(agent: &ureq::Agent, query: &str) -> Result<Option<String>> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(query)
        );

        let raw = agent
            .get(&url)
            .call()
            .map_err(|e| AssistantError::Tool(format!("search request failed: {e}")))?
            .into_string()
            .map_err(|e| AssistantError::Tool(format!("search body unreadable: {e}")))?;

        let data: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| AssistantError::Tool(format!("search response not JSON: {e}")))?;

        // Prefer the abstract; fall back to the first related-topic snippet.
        if let Some(abstract_text) = data["AbstractText"].as_str()
            && !abstract_text.trim().is_empty()
        {
            return Ok(Some(abstract_text.trim().to_owned()));
        }

        let snippet = data["RelatedTopics"]
            .as_array()
            .and_then(|topics| {
                topics.iter().find_map(|topic| {
                    topic["Text"]
                        .as_str()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                })
            })
            .map(str::to_owned);

        Ok(snippet)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "perguntas sobre atualidades, notícias ou buscas complexas."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("consulta de busca.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(query) = text_arg(args.as_ref()) else {
            return Ok(ToolOutput::text(
                "Claro, o que você gostaria que eu pesquisasse na web?",
            ));
        };

        // Announce before the (slow) search so the user knows work started.
        if let Err(e) = self
            .voice
            .speak(&format!(
                "Ok, pesquisando na web sobre {query}. Isso pode levar um momento."
            ))
            .await
        {
            error!("speech synthesis failed: {e}");
        }

        let agent = self.agent.clone();
        let query_for_worker = query.clone();
        let answer = tokio::task::spawn_blocking(move || {
            Self::fetch_answer(&agent, &query_for_worker)
        })
        .await
        .unwrap_or_else(|e| Err(AssistantError::Task(format!("search worker: {e}"))));

        match answer {
            Ok(Some(answer)) => Ok(ToolOutput::text(format!(
                "A pesquisa retornou o seguinte: {answer}"
            ))),
            Ok(None) => Ok(ToolOutput::text(format!(
                "Não encontrei um bom resultado para {query}."
            ))),
            Err(e) => {
                error!("web search for '{query}' failed: {e}");
                Ok(ToolOutput::text(
                    "Desculpe, ocorreu um erro ao realizar a pesquisa na web.",
                ))
            }
        }
    }
}
