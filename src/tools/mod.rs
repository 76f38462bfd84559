//! Tool contract and registry.
//!
//! Every capability the assistant can execute is a named [`Tool`]. The
//! registry is built once at startup and immutable afterwards; the
//! dispatcher resolves semantic-routing decisions against it by name, and
//! an unknown name is a graceful "didn't understand" turn, never a crash.
//!
//! Handlers return user-facing text (spoken and recorded in memory) or a
//! [`ControlSignal`] that changes the caller's control flow instead of
//! being spoken. Well-behaved tools answer their own failures with
//! user-facing error text; the dispatcher still wraps every invocation
//! defensively.

pub mod calendar;
pub mod clock;
pub mod documents;
pub mod joke;
pub mod system;
pub mod weather;
pub mod web_search;
pub mod wikipedia;

use crate::config::AssistantConfig;
use crate::error::Result;
use crate::speech::{Confirmation, SpeechSynthesizer};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Distinguished non-text outcome that changes the caller's control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Shut the assistant down. The quit tool speaks its own farewell
    /// before returning this; the dispatcher propagates it unspoken.
    Quit,
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// Text to speak and record as the assistant's turn.
    Text(String),
    /// Control-flow signal for the caller.
    Signal(ControlSignal),
}

impl ToolOutput {
    /// Convenience constructor for text output.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

/// A named unit of functionality invocable with optional arguments.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Symbolic name the router selects this tool by.
    fn name(&self) -> &'static str;

    /// Natural-language description for the router's tool catalogue.
    fn description(&self) -> &'static str;

    /// Description of the expected argument, when the tool takes one.
    fn args_hint(&self) -> Option<&'static str> {
        None
    }

    /// Execute with the router-provided argument (absent when the router
    /// answered `null`).
    ///
    /// # Errors
    ///
    /// Execution failures the tool could not translate into user-facing
    /// text; the dispatcher converts them into a generic apology.
    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput>;
}

/// Immutable name → handler mapping.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Look a tool up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the tool catalogue for the router prompt, one
    /// `- "name": description` line per tool in name order, with the
    /// argument hint appended when the tool declares one.
    #[must_use]
    pub fn catalogue(&self) -> String {
        let mut lines = Vec::with_capacity(self.tools.len());
        for name in self.names() {
            let tool = &self.tools[name];
            let line = match tool.args_hint() {
                Some(hint) => {
                    format!("- \"{}\": {} Argumento: {}", name, tool.description(), hint)
                }
                None => format!("- \"{}\": {}", name, tool.description()),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Sentinel catalogue entries handled inline by the dispatcher, appended to
/// the registry catalogue when building the router prompt.
pub const SENTINEL_CATALOGUE: &str = "\
- \"general_chat\": conversa casual, cumprimentos ou perguntas que você mesmo pode responder sem ferramentas.\n\
- \"cancel\": o usuário desistiu do pedido ou quer cancelar o que estava sendo feito.";

/// Coerce a router argument into plain text.
///
/// Strings pass through trimmed; scalar numbers and booleans are rendered;
/// objects, arrays, and empty strings yield `None` so argument-taking tools
/// ask for clarification instead of working with garbage.
#[must_use]
pub fn text_arg(args: Option<&serde_json::Value>) -> Option<String> {
    match args? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Build the full built-in registry.
///
/// Constructed once at startup; tool handlers capture the voice and
/// confirmation handles they need for mid-execution prompts.
#[must_use]
pub fn builtin_registry(
    config: &AssistantConfig,
    voice: Arc<dyn SpeechSynthesizer>,
    confirm: Arc<dyn Confirmation>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(clock::TimeTool));
    registry.register(Arc::new(clock::DateTool));
    registry.register(Arc::new(joke::JokeTool::new()));
    registry.register(Arc::new(weather::WeatherTool::new()));
    registry.register(Arc::new(wikipedia::WikipediaTool::new(
        &config.assistant.language,
    )));
    registry.register(Arc::new(web_search::WebSearchTool::new(Arc::clone(
        &voice,
    ))));

    registry.register(Arc::new(system::OpenAppTool::new(config.apps.clone())));
    registry.register(Arc::new(system::ShutdownTool::new(Arc::clone(&confirm))));
    registry.register(Arc::new(system::CancelShutdownTool));
    registry.register(Arc::new(system::QuitTool::new(Arc::clone(&voice))));

    let calendar = calendar::CalendarStore::new(config.storage.calendar_path.clone());
    registry.register(Arc::new(calendar::CalendarAddTool::new(
        calendar.clone(),
        Arc::clone(&voice),
    )));
    registry.register(Arc::new(calendar::CalendarCheckTool::new(
        calendar.clone(),
        Arc::clone(&voice),
    )));
    registry.register(Arc::new(calendar::CalendarDeleteTool::new(
        calendar,
        Arc::clone(&voice),
    )));

    let documents = documents::DocumentStore::new(config.storage.documents_dir.clone());
    registry.register(Arc::new(documents::DocSearchTool::new(
        documents.clone(),
        Arc::clone(&voice),
    )));
    registry.register(Arc::new(documents::DocIndexTool::new(documents, voice)));

    registry
}
