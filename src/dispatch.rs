//! Hybrid command dispatch.
//!
//! System routes come first: an ordered table of regular-expression
//! patterns covering safety- and latency-critical commands (application
//! launch, shutdown, cancel, quit, plus time/date/joke for speed). The
//! first matching pattern claims the command — even when its handler fails
//! — so a command like "cancelar o desligamento" can never leak into the
//! language model.
//!
//! Everything else goes to the semantic router, which resolves its
//! `{tool, args}` decision against the registry, with deliberate
//! degradation: an unparseable router answer becomes a web search for the
//! raw command, an unreachable router becomes general chat.
//!
//! `process` is the error boundary for a whole turn: it never panics and
//! never returns an error, only an optional control signal.

use crate::error::AssistantError;
use crate::memory::ConversationMemory;
use crate::router::{RouteDecision, SemanticRouter};
use crate::speech::SpeechSynthesizer;
use crate::tools::{ControlSignal, ToolOutput, ToolRegistry};
use regex::Regex;
use std::sync::Arc;
use tracing::{error, info, warn};

const GENERAL_CHAT_REPLY: &str = "Entendi. Como posso ajudar com isso?";
const CANCEL_REPLY: &str = "Tudo bem, comando cancelado.";
const UNKNOWN_TOOL_REPLY: &str = "Desculpe, não entendi o que você quis dizer.";
const OPEN_APP_CLARIFICATION: &str = "Claro, qual aplicativo você gostaria de abrir?";
const SYSTEM_ROUTE_APOLOGY: &str = "Desculpe, ocorreu um erro ao processar o comando.";
const TOOL_APOLOGY: &str = "Desculpe, ocorreu um erro ao executar essa ação.";

/// What a deterministic route does once its pattern matches.
#[derive(Debug, Clone, Copy)]
enum RouteAction {
    /// Invoke a registered tool with no argument.
    Tool(&'static str),
    /// Extract the application name after the matched keyword, then invoke
    /// the open-app tool with it.
    OpenApp,
}

/// One entry of the deterministic route table.
struct SystemRoute {
    pattern: Regex,
    action: RouteAction,
}

/// The deterministic route table, in match-priority order. First match
/// wins; order is significant (the cancel-shutdown patterns must be tried
/// before the shutdown ones).
fn system_routes() -> crate::error::Result<Vec<SystemRoute>> {
    let table: [(&str, RouteAction); 7] = [
        (r"\b(que horas são|horas)\b", RouteAction::Tool("time")),
        (
            r"\b(que dia é hoje|data de hoje)\b",
            RouteAction::Tool("date"),
        ),
        (r"\bpiadas?\b", RouteAction::Tool("joke")),
        (
            r"\b(abra|abrir|inicie|iniciar|execute|executar)\b",
            RouteAction::OpenApp,
        ),
        (
            r"\b(cancele o desligamento|cancelar desligamento|cancelar|cancele)\b",
            RouteAction::Tool("cancel_shutdown"),
        ),
        (r"\b(desligar|desligue)\b", RouteAction::Tool("shutdown")),
        (r"\b(sair|encerrar|tchau)\b", RouteAction::Tool("quit")),
    ];

    table
        .into_iter()
        .map(|(pattern, action)| {
            let pattern = Regex::new(pattern).map_err(|e| {
                AssistantError::Config(format!("invalid route pattern '{pattern}': {e}"))
            })?;
            Ok(SystemRoute { pattern, action })
        })
        .collect()
}

/// Extract the argument that follows `keyword` inside `command`.
///
/// Takes everything after the first keyword occurrence, drops one leading
/// article token (o/a/os/as), and trims trailing punctuation. Returns an
/// empty string when the keyword is absent or nothing follows it.
fn extract_argument(command: &str, keyword: &str) -> String {
    let lower = command.to_lowercase();
    let Some(pos) = lower.find(&keyword.to_lowercase()) else {
        return String::new();
    };

    let after = lower[pos + keyword.len()..].trim();

    let mut words = after.split_whitespace();
    let argument = match words.next() {
        Some(first) if matches!(first, "o" | "a" | "os" | "as") => {
            words.collect::<Vec<_>>().join(" ")
        }
        _ => after.to_owned(),
    };

    argument
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_owned()
}

/// The hybrid dispatcher.
///
/// Owns the conversation memory: exactly one user-message append per
/// processed command, at most one assistant-message append, and tool
/// handlers never touch the memory directly.
pub struct CommandHandler {
    routes: Vec<SystemRoute>,
    registry: ToolRegistry,
    router: SemanticRouter,
    memory: ConversationMemory,
    voice: Arc<dyn SpeechSynthesizer>,
}

impl CommandHandler {
    /// Assemble a dispatcher.
    ///
    /// # Errors
    ///
    /// `Config` when the route table fails to compile.
    pub fn new(
        registry: ToolRegistry,
        router: SemanticRouter,
        memory: ConversationMemory,
        voice: Arc<dyn SpeechSynthesizer>,
    ) -> crate::error::Result<Self> {
        Ok(Self {
            routes: system_routes()?,
            registry,
            router,
            memory,
            voice,
        })
    }

    /// Read access to the conversation memory.
    #[must_use]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Mutable access, for explicit reset commands only.
    pub fn memory_mut(&mut self) -> &mut ConversationMemory {
        &mut self.memory
    }

    /// Process one command: system routes first, semantic routing after.
    ///
    /// Returns a control signal only when a quit-style tool was actually
    /// invoked; every failure mode is contained and answered with speech.
    pub async fn process(&mut self, command: &str) -> Option<ControlSignal> {
        let command = command.trim();
        if command.is_empty() {
            return None;
        }

        // The freshest turn must be visible to the router prompt (and to
        // any fallback), so the user message lands before any routing.
        self.memory.add_user_message(command);

        let lower = command.to_lowercase();
        let matched = self.routes.iter().find_map(|route| {
            route
                .pattern
                .find(&lower)
                .map(|m| (route.action, m.as_str().to_owned()))
        });

        match matched {
            Some((action, keyword)) => self.run_system_route(action, &lower, &keyword).await,
            None => self.route_semantic(command).await,
        }
    }

    /// Run a deterministic system route. The route claims the command even
    /// on failure — control never falls through to semantic routing.
    async fn run_system_route(
        &mut self,
        action: RouteAction,
        command: &str,
        keyword: &str,
    ) -> Option<ControlSignal> {
        let outcome = match action {
            RouteAction::Tool(name) => {
                info!("system route '{keyword}' → {name}");
                self.invoke_registered(name, None).await
            }
            RouteAction::OpenApp => {
                info!("system route '{keyword}' → open_app");
                let argument = extract_argument(command, keyword);
                if argument.is_empty() {
                    Ok(ToolOutput::text(OPEN_APP_CLARIFICATION))
                } else {
                    self.invoke_registered(
                        "open_app",
                        Some(serde_json::Value::String(argument)),
                    )
                    .await
                }
            }
        };

        match outcome {
            Ok(ToolOutput::Signal(signal)) => Some(signal),
            Ok(ToolOutput::Text(text)) => {
                if !text.trim().is_empty() {
                    self.say_and_record(&text).await;
                }
                None
            }
            Err(e) => {
                error!("system route failed for '{command}': {e}");
                self.say_and_record(SYSTEM_ROUTE_APOLOGY).await;
                None
            }
        }
    }

    /// Semantic routing with graceful degradation.
    async fn route_semantic(&mut self, command: &str) -> Option<ControlSignal> {
        let history = self.memory.get_formatted_history();

        let decision = match self.router.route(command, &history).await {
            Ok(decision) => decision,
            Err(AssistantError::LlmResponse(e)) => {
                warn!("router answer unusable, degrading to web search: {e}");
                RouteDecision::with_text("web_search", command)
            }
            Err(e) => {
                warn!("router unreachable, degrading to general chat: {e}");
                RouteDecision::bare("general_chat")
            }
        };

        // Sentinels are handled inline, without a registry lookup.
        match decision.tool.as_str() {
            "general_chat" => {
                self.say_and_record(GENERAL_CHAT_REPLY).await;
                return None;
            }
            "cancel" => {
                self.say_and_record(CANCEL_REPLY).await;
                return None;
            }
            _ => {}
        }

        let Some(tool) = self.registry.get(&decision.tool) else {
            warn!("router chose unknown tool '{}' for '{command}'", decision.tool);
            self.say(UNKNOWN_TOOL_REPLY).await;
            return None;
        };

        info!("semantic route '{command}' → {}", decision.tool);
        let args = decision.args.filter(|v| !v.is_null());
        match tool.invoke(args).await {
            Ok(ToolOutput::Signal(signal)) => Some(signal),
            Ok(ToolOutput::Text(text)) => {
                if !text.trim().is_empty() {
                    self.say_and_record(&text).await;
                }
                None
            }
            Err(e) => {
                error!("tool '{}' failed for '{command}': {e}", decision.tool);
                self.say_and_record(TOOL_APOLOGY).await;
                None
            }
        }
    }

    async fn invoke_registered(
        &self,
        name: &str,
        args: Option<serde_json::Value>,
    ) -> crate::error::Result<ToolOutput> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| AssistantError::Tool(format!("tool '{name}' is not registered")))?;
        tool.invoke(args).await
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.voice.speak(text).await {
            error!("speech synthesis failed: {e}");
        }
    }

    async fn say_and_record(&mut self, text: &str) {
        self.say(text).await;
        self.memory.add_assistant_message(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::llm::{ChatMessage, CompletionService};
    use crate::memory::Role;
    use crate::speech::SpeechSynthesizer;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Test doubles ────────────────────────────────────────────────

    struct RecordingVoice {
        spoken: Mutex<Vec<String>>,
    }

    impl RecordingVoice {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
            })
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingVoice {
        async fn speak(&self, text: &str) -> Result<()> {
            self.spoken.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    #[derive(Clone)]
    enum StubBehavior {
        Text(&'static str),
        Quit,
        Fail,
    }

    struct StubTool {
        tool_name: &'static str,
        behavior: StubBehavior,
        calls: Mutex<Vec<Option<serde_json::Value>>>,
    }

    impl StubTool {
        fn new(tool_name: &'static str, behavior: StubBehavior) -> Arc<Self> {
            Arc::new(Self {
                tool_name,
                behavior,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Option<serde_json::Value>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &'static str {
            self.tool_name
        }
        fn description(&self) -> &'static str {
            "stub"
        }
        async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(args);
            match &self.behavior {
                StubBehavior::Text(text) => Ok(ToolOutput::text(*text)),
                StubBehavior::Quit => Ok(ToolOutput::Signal(ControlSignal::Quit)),
                StubBehavior::Fail => Err(AssistantError::Tool("boom".to_owned())),
            }
        }
    }

    struct CountingService {
        answer: Mutex<Option<Result<String>>>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl CountingService {
        fn answering(answer: Result<String>) -> Arc<Self> {
            Arc::new(Self {
                answer: Mutex::new(Some(answer)),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }

        fn unreachable_endpoint() -> Arc<Self> {
            Self::answering(Err(AssistantError::LlmConnection(
                "connection refused".to_owned(),
            )))
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CompletionService for CountingService {
        fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = messages.first().map(|m| m.content.clone());
            self.answer
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(r#"{"tool": "general_chat", "args": null}"#.to_owned()))
        }
    }

    struct Fixture {
        handler: CommandHandler,
        voice: Arc<RecordingVoice>,
        service: Arc<CountingService>,
        time: Arc<StubTool>,
        open_app: Arc<StubTool>,
        cancel_shutdown: Arc<StubTool>,
        quit: Arc<StubTool>,
        wikipedia: Arc<StubTool>,
        web_search: Arc<StubTool>,
    }

    fn fixture_with(service: Arc<CountingService>, broken_time: bool) -> Fixture {
        let voice = RecordingVoice::new();

        let time = StubTool::new(
            "time",
            if broken_time {
                StubBehavior::Fail
            } else {
                StubBehavior::Text("São 10:00.")
            },
        );
        let open_app = StubTool::new("open_app", StubBehavior::Text("Abrindo navegador."));
        let cancel_shutdown =
            StubTool::new("cancel_shutdown", StubBehavior::Text("Desligamento cancelado."));
        let quit = StubTool::new("quit", StubBehavior::Quit);
        let wikipedia = StubTool::new("wikipedia", StubBehavior::Text("Resultado da Wikipedia."));
        let web_search = StubTool::new("web_search", StubBehavior::Text("Resultado da busca."));
        let broken = StubTool::new("joke", StubBehavior::Fail);

        let mut registry = ToolRegistry::new();
        for tool in [
            &time,
            &open_app,
            &cancel_shutdown,
            &quit,
            &wikipedia,
            &web_search,
            &broken,
        ] {
            registry.register(Arc::clone(tool) as Arc<dyn Tool>);
        }

        let router = SemanticRouter::new(
            Arc::clone(&service) as Arc<dyn CompletionService>,
            "Stuart",
            registry.catalogue(),
        );
        let memory = ConversationMemory::new(10, "Stuart");
        let handler = CommandHandler::new(
            registry,
            router,
            memory,
            Arc::clone(&voice) as Arc<dyn SpeechSynthesizer>,
        )
        .unwrap();

        Fixture {
            handler,
            voice,
            service,
            time,
            open_app,
            cancel_shutdown,
            quit,
            wikipedia,
            web_search,
        }
    }

    fn fixture_answering(decision: &str) -> Fixture {
        fixture_with(CountingService::answering(Ok(decision.to_owned())), false)
    }

    // ── System routes ───────────────────────────────────────────────

    #[tokio::test]
    async fn empty_command_has_no_side_effects() {
        let mut f = fixture_answering("{}");
        assert!(f.handler.process("").await.is_none());
        assert!(f.handler.process("   ").await.is_none());
        assert!(f.voice.spoken().is_empty());
        assert!(f.handler.memory().is_empty());
        assert_eq!(f.service.call_count(), 0);
    }

    #[tokio::test]
    async fn time_route_never_reaches_the_router() {
        let mut f = fixture_answering("{}");
        let signal = f.handler.process("que horas são").await;

        assert!(signal.is_none());
        assert_eq!(f.time.calls().len(), 1);
        assert_eq!(f.service.call_count(), 0);
        assert_eq!(f.voice.spoken(), vec!["São 10:00.".to_owned()]);
    }

    #[tokio::test]
    async fn time_route_records_both_turns() {
        let mut f = fixture_answering("{}");
        f.handler.process("que horas são").await;

        let entries: Vec<(Role, &str)> = f
            .handler
            .memory()
            .entries()
            .map(|e| (e.role, e.content.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![
                (Role::User, "que horas são"),
                (Role::Assistant, "São 10:00."),
            ]
        );
    }

    #[tokio::test]
    async fn open_app_extracts_and_passes_the_argument() {
        let mut f = fixture_answering("{}");
        f.handler.process("abra o navegador").await;

        assert_eq!(
            f.open_app.calls(),
            vec![Some(serde_json::json!("navegador"))]
        );
        assert_eq!(f.service.call_count(), 0);
    }

    #[tokio::test]
    async fn open_app_without_argument_asks_for_clarification() {
        let mut f = fixture_answering("{}");
        f.handler.process("abra").await;

        assert!(f.open_app.calls().is_empty());
        assert_eq!(f.voice.spoken(), vec![OPEN_APP_CLARIFICATION.to_owned()]);
    }

    #[tokio::test]
    async fn cancel_matches_before_any_semantic_routing() {
        let mut f = fixture_answering("{}");
        f.handler.process("cancelar").await;

        assert_eq!(f.cancel_shutdown.calls().len(), 1);
        assert_eq!(f.service.call_count(), 0);
    }

    #[tokio::test]
    async fn cancel_the_shutdown_stays_deterministic() {
        let mut f = fixture_answering("{}");
        f.handler.process("cancele o desligamento").await;

        assert_eq!(f.cancel_shutdown.calls().len(), 1);
        assert_eq!(f.service.call_count(), 0);
    }

    #[tokio::test]
    async fn quit_signal_propagates_unspoken() {
        let mut f = fixture_answering("{}");
        let signal = f.handler.process("sair").await;

        assert_eq!(signal, Some(ControlSignal::Quit));
        assert_eq!(f.quit.calls().len(), 1);
        // The quit tool speaks its own farewell; the dispatcher stays quiet.
        assert!(f.voice.spoken().is_empty());
    }

    #[tokio::test]
    async fn failed_system_route_apologizes_and_claims_the_command() {
        let mut f = fixture_with(CountingService::answering(Ok("{}".to_owned())), true);
        let signal = f.handler.process("que horas são").await;

        assert!(signal.is_none());
        assert_eq!(f.voice.spoken(), vec![SYSTEM_ROUTE_APOLOGY.to_owned()]);
        // No fall-through to semantic routing.
        assert_eq!(f.service.call_count(), 0);
    }

    // ── Semantic routes ─────────────────────────────────────────────

    #[tokio::test]
    async fn semantic_route_invokes_the_decided_tool() {
        let mut f = fixture_answering(r#"{"tool": "wikipedia", "args": "Marie Curie"}"#);
        f.handler.process("quem foi marie curie").await;

        assert_eq!(f.service.call_count(), 1);
        assert_eq!(
            f.wikipedia.calls(),
            vec![Some(serde_json::json!("Marie Curie"))]
        );
        assert_eq!(f.voice.spoken(), vec!["Resultado da Wikipedia.".to_owned()]);
    }

    #[tokio::test]
    async fn semantic_result_is_recorded_in_memory() {
        let mut f = fixture_answering(r#"{"tool": "wikipedia", "args": "Marie Curie"}"#);
        f.handler.process("quem foi marie curie").await;

        let history = f.handler.memory().get_formatted_history();
        assert!(history.contains("Usuário: quem foi marie curie"));
        assert!(history.contains("Stuart: Resultado da Wikipedia."));
    }

    #[tokio::test]
    async fn null_args_are_omitted_not_passed_through() {
        let mut f = fixture_answering(r#"{"tool": "wikipedia", "args": null}"#);
        f.handler.process("fale sobre física quântica").await;

        assert_eq!(f.service.call_count(), 1);
        // The tool receives no argument at all, not a JSON null.
        assert_eq!(f.wikipedia.calls(), vec![None]);
    }

    #[tokio::test]
    async fn user_turn_is_in_history_before_the_router_runs() {
        let mut f = fixture_answering(r#"{"tool": "general_chat", "args": null}"#);
        f.handler.process("bom dia").await;

        let prompt = f.service.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Usuário: bom dia"));
    }

    #[tokio::test]
    async fn general_chat_sentinel_answers_inline() {
        let mut f = fixture_answering(r#"{"tool": "general_chat", "args": null}"#);
        f.handler.process("olá, tudo bem?").await;

        assert_eq!(f.voice.spoken(), vec![GENERAL_CHAT_REPLY.to_owned()]);
        let history = f.handler.memory().get_formatted_history();
        assert!(history.contains(GENERAL_CHAT_REPLY));
    }

    #[tokio::test]
    async fn cancel_sentinel_acknowledges_and_updates_memory() {
        let mut f = fixture_answering(r#"{"tool": "cancel", "args": null}"#);
        f.handler.process("deixa pra lá").await;

        assert_eq!(f.voice.spoken(), vec![CANCEL_REPLY.to_owned()]);
        let entries: Vec<&str> = f
            .handler
            .memory()
            .entries()
            .map(|e| e.content.as_str())
            .collect();
        assert_eq!(entries, vec!["deixa pra lá", CANCEL_REPLY]);
    }

    #[tokio::test]
    async fn unknown_tool_name_is_a_graceful_turn() {
        let mut f = fixture_answering(r#"{"tool": "time_travel", "args": null}"#);
        let signal = f.handler.process("volte no tempo").await;

        assert!(signal.is_none());
        assert_eq!(f.voice.spoken(), vec![UNKNOWN_TOOL_REPLY.to_owned()]);
        // Only the user turn is recorded; no assistant entry for a tool
        // result that never existed.
        assert_eq!(f.handler.memory().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_router_answer_degrades_to_web_search() {
        let mut f = fixture_answering("claro! vou te ajudar com isso");
        f.handler.process("qual o preço do bitcoin hoje").await;

        assert_eq!(
            f.web_search.calls(),
            vec![Some(serde_json::json!("qual o preço do bitcoin hoje"))]
        );
        assert!(f.wikipedia.calls().is_empty());
    }

    #[tokio::test]
    async fn unreachable_router_degrades_to_general_chat() {
        let mut f = fixture_with(CountingService::unreachable_endpoint(), false);
        f.handler.process("bom dia, como vai?").await;

        assert_eq!(f.voice.spoken(), vec![GENERAL_CHAT_REPLY.to_owned()]);
        // No registry tool runs on the degraded path.
        assert!(f.web_search.calls().is_empty());
        assert!(f.wikipedia.calls().is_empty());
    }

    #[tokio::test]
    async fn failing_semantic_tool_is_contained() {
        let mut f = fixture_answering(r#"{"tool": "joke", "args": null}"#);
        let signal = f.handler.process("me conte algo engraçado").await;

        assert!(signal.is_none());
        assert_eq!(f.voice.spoken(), vec![TOOL_APOLOGY.to_owned()]);
        // The turn still completes with the apology as the assistant turn.
        let history = f.handler.memory().get_formatted_history();
        assert!(history.contains(TOOL_APOLOGY));
    }

    // ── Argument extraction ─────────────────────────────────────────

    #[test]
    fn extraction_strips_leading_article() {
        assert_eq!(extract_argument("abra o navegador", "abra"), "navegador");
        assert_eq!(extract_argument("abra a calculadora", "abra"), "calculadora");
    }

    #[test]
    fn extraction_keeps_multiword_arguments() {
        assert_eq!(
            extract_argument("abra o editor de código", "abra"),
            "editor de código"
        );
    }

    #[test]
    fn extraction_trims_trailing_punctuation() {
        assert_eq!(extract_argument("abra o navegador!", "abra"), "navegador");
        assert_eq!(extract_argument("execute firefox.", "execute"), "firefox");
    }

    #[test]
    fn extraction_without_keyword_is_empty() {
        assert_eq!(extract_argument("toque uma música", "abra"), "");
    }

    #[test]
    fn extraction_with_nothing_after_keyword_is_empty() {
        assert_eq!(extract_argument("abra", "abra"), "");
        assert_eq!(extract_argument("abra o", "abra"), "");
    }
}
