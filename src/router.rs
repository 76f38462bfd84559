//! LLM-driven semantic routing.
//!
//! Converts one free-form command plus the conversation transcript into a
//! structured `{tool, args}` decision. The router itself is stateless: it
//! builds a single classification prompt, runs one completion on a worker
//! thread, and parses the answer. Fallback policy on failure belongs to the
//! dispatcher, not here — this module only distinguishes *why* routing
//! failed (unparseable answer vs. unreachable endpoint).

use crate::error::{AssistantError, Result};
use crate::llm::{ChatMessage, CompletionService};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// A routing decision produced by the language model.
///
/// `args` is `None` both when the model answered `"args": null` and when it
/// omitted the field; tools that need an argument answer with a
/// clarification question in that case.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RouteDecision {
    /// Symbolic tool name.
    pub tool: String,
    /// Tool argument: a string, a structured object, or absent.
    #[serde(default)]
    pub args: Option<serde_json::Value>,
}

impl RouteDecision {
    /// Decision pointing at `tool` with a plain-text argument.
    #[must_use]
    pub fn with_text(tool: &str, args: &str) -> Self {
        Self {
            tool: tool.to_owned(),
            args: Some(serde_json::Value::String(args.to_owned())),
        }
    }

    /// Decision pointing at `tool` with no argument.
    #[must_use]
    pub fn bare(tool: &str) -> Self {
        Self {
            tool: tool.to_owned(),
            args: None,
        }
    }
}

/// Semantic router backed by a completion service.
///
/// One instance is shared across all commands in a session; it holds no
/// per-command state beyond the injected service handle.
pub struct SemanticRouter {
    service: Arc<dyn CompletionService>,
    display_name: String,
    catalogue: String,
}

impl SemanticRouter {
    /// Create a router over `service`.
    ///
    /// `catalogue` is the rendered tool list embedded in every prompt, one
    /// `- "name": description` line per tool (see
    /// [`ToolRegistry::catalogue`](crate::tools::ToolRegistry::catalogue)).
    #[must_use]
    pub fn new(
        service: Arc<dyn CompletionService>,
        display_name: impl Into<String>,
        catalogue: impl Into<String>,
    ) -> Self {
        Self {
            service,
            display_name: display_name.into(),
            catalogue: catalogue.into(),
        }
    }

    /// Classify one command into a tool decision.
    ///
    /// `history` is the formatted conversation transcript; it is advisory
    /// context for reference resolution, not binding memory.
    ///
    /// # Errors
    ///
    /// `LlmResponse` when the model's answer is not a valid decision (the
    /// caller substitutes a web search); `LlmConnection` when the endpoint
    /// cannot be reached (the caller substitutes general chat). Never
    /// retries.
    pub async fn route(&self, command: &str, history: &str) -> Result<RouteDecision> {
        let prompt = self.build_prompt(command, history);
        let service = Arc::clone(&self.service);

        // The completion blocks for seconds; keep it off the cooperative
        // scheduler.
        let raw = tokio::task::spawn_blocking(move || {
            service.complete(&[ChatMessage::user(prompt)])
        })
        .await
        .map_err(|e| AssistantError::LlmConnection(format!("router worker failed: {e}")))??;

        let decision = parse_decision(&raw)?;
        debug!("routed to tool '{}'", decision.tool);
        Ok(decision)
    }

    fn build_prompt(&self, command: &str, history: &str) -> String {
        let name = &self.display_name;
        let catalogue = &self.catalogue;
        let history = if history.trim().is_empty() {
            "(sem histórico)"
        } else {
            history
        };

        format!(
            "Você é o cérebro de um assistente virtual chamado {name}.\n\
             Sua função é analisar o comando do usuário e decidir qual ferramenta usar.\n\
             \n\
             Ferramentas disponíveis:\n\
             {catalogue}\n\
             \n\
             Histórico da conversa:\n\
             {history}\n\
             \n\
             Responda APENAS um objeto JSON no seguinte formato, sem markdown ou explicações:\n\
             {{\"tool\": \"nome_da_ferramenta\", \"args\": \"argumento_ou_null\"}}\n\
             \n\
             Exemplos:\n\
             Usuário: \"Que horas são?\" -> {{\"tool\": \"time\", \"args\": null}}\n\
             Usuário: \"Está chovendo em São Paulo?\" -> {{\"tool\": \"weather\", \"args\": \"São Paulo\"}}\n\
             Usuário: \"Quem foi Marie Curie?\" -> {{\"tool\": \"wikipedia\", \"args\": \"Marie Curie\"}}\n\
             Usuário: \"Preço do Bitcoin hoje\" -> {{\"tool\": \"web_search\", \"args\": \"Preço do Bitcoin hoje\"}}\n\
             Usuário: \"Marque dentista amanhã às 15h\" -> {{\"tool\": \"calendar_add\", \"args\": {{\"title\": \"dentista\", \"datetime\": \"amanhã 15:00\"}}}}\n\
             Usuário: \"Olá {name}, tudo bem?\" -> {{\"tool\": \"general_chat\", \"args\": null}}\n\
             \n\
             Comando do usuário: \"{command}\"\n\
             JSON:"
        )
    }
}

/// Parse the raw model answer into a decision.
fn parse_decision(raw: &str) -> Result<RouteDecision> {
    let cleaned = strip_code_fences(raw);

    let decision: RouteDecision = serde_json::from_str(&cleaned)
        .map_err(|e| AssistantError::LlmResponse(format!("undecodable decision ({e}): {raw}")))?;

    if decision.tool.trim().is_empty() {
        return Err(AssistantError::LlmResponse(format!(
            "decision with empty tool name: {raw}"
        )));
    }

    Ok(decision)
}

/// Drop markdown code-fence markers the model may wrap its answer in.
fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_owned()
}
