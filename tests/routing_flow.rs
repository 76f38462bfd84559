//! End-to-end routing scenarios through the public API.
//!
//! Exercises utterance → wake-word gate → dispatcher → tool with scripted
//! boundary collaborators: a recording voice, stub tools, and a scripted
//! completion service. No audio hardware, network, or LLM involved.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stuart::assistant::Assistant;
use stuart::config::AssistantConfig;
use stuart::dispatch::CommandHandler;
use stuart::error::{AssistantError, Result};
use stuart::llm::{ChatMessage, CompletionService};
use stuart::memory::ConversationMemory;
use stuart::router::SemanticRouter;
use stuart::speech::{AudioClip, AudioInput, ListenOptions, SpeechSynthesizer, Transcriber};
use stuart::tools::{ControlSignal, Tool, ToolOutput, ToolRegistry};

// ── Test doubles ────────────────────────────────────────────────────

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

struct StubTool {
    tool_name: &'static str,
    reply: Option<&'static str>,
    calls: Mutex<Vec<Option<serde_json::Value>>>,
}

impl StubTool {
    fn speaking(tool_name: &'static str, reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            tool_name,
            reply: Some(reply),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A quit-style stub: no text, just the signal.
    fn quitting(tool_name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            tool_name,
            reply: None,
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
        match self.reply {
            Some(reply) => Ok(ToolOutput::text(reply)),
            None => Ok(ToolOutput::Signal(ControlSignal::Quit)),
        }
    }
}

struct ScriptedService {
    answers: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedService {
    fn answering(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|s| (*s).to_owned()).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionService for ScriptedService {
    fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AssistantError::LlmConnection("script exhausted".to_owned()))
    }
}

/// Audio capture scripted with pre-baked utterances.
struct ScriptedInput {
    utterances: Mutex<VecDeque<String>>,
}

impl ScriptedInput {
    fn hearing(utterances: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            utterances: Mutex::new(utterances.iter().map(|s| (*s).to_owned()).collect()),
        })
    }
}

impl AudioInput for ScriptedInput {
    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn listen(&self, _opts: &ListenOptions) -> Result<AudioClip> {
        match self.utterances.lock().unwrap().pop_front() {
            Some(text) => Ok(AudioClip {
                bytes: text.into_bytes(),
            }),
            None => panic!("listen called after the script was exhausted"),
        }
    }
}

/// Transcriber that decodes the scripted clip bytes back into text.
struct PassthroughTranscriber;

impl Transcriber for PassthroughTranscriber {
    fn transcribe(
        &self,
        clip: &AudioClip,
        _language: &str,
        _prompt_bias: Option<&str>,
    ) -> Result<String> {
        String::from_utf8(clip.bytes.clone())
            .map_err(|e| AssistantError::Transcription(e.to_string()))
    }
}

struct Fixture {
    assistant: Assistant,
    voice: Arc<RecordingVoice>,
    service: Arc<ScriptedService>,
    time: Arc<StubTool>,
    open_app: Arc<StubTool>,
    cancel_shutdown: Arc<StubTool>,
    quit: Arc<StubTool>,
    wikipedia: Arc<StubTool>,
}

fn fixture(answers: &[&str], utterances: &[&str]) -> Fixture {
    let config = AssistantConfig::default();
    let voice = RecordingVoice::new();
    let service = ScriptedService::answering(answers);

    let time = StubTool::speaking("time", "São 10:00.");
    let open_app = StubTool::speaking("open_app", "Abrindo navegador.");
    let cancel_shutdown = StubTool::speaking("cancel_shutdown", "Desligamento cancelado.");
    let quit = StubTool::quitting("quit");
    let wikipedia = StubTool::speaking("wikipedia", "Marie Curie foi uma física polonesa.");

    let mut registry = ToolRegistry::new();
    for tool in [&time, &open_app, &cancel_shutdown, &quit, &wikipedia] {
        registry.register(Arc::clone(tool) as Arc<dyn Tool>);
    }

    let router = SemanticRouter::new(
        Arc::clone(&service) as Arc<dyn CompletionService>,
        "Stuart",
        registry.catalogue(),
    );
    let memory = ConversationMemory::new(config.memory.window_size, "Stuart");
    let handler = CommandHandler::new(
        registry,
        router,
        memory,
        Arc::clone(&voice) as Arc<dyn SpeechSynthesizer>,
    )
    .unwrap();

    let assistant = Assistant::new(
        &config,
        handler,
        ScriptedInput::hearing(utterances),
        Arc::new(PassthroughTranscriber),
        Arc::clone(&voice) as Arc<dyn SpeechSynthesizer>,
    );

    Fixture {
        assistant,
        voice,
        service,
        time,
        open_app,
        cancel_shutdown,
        quit,
        wikipedia,
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn time_request_stays_deterministic() {
    let mut f = fixture(&[], &[]);
    let signal = f.assistant.handle_utterance("stuart que horas são").await;

    assert!(signal.is_none());
    assert_eq!(f.time.calls().len(), 1);
    assert_eq!(f.service.call_count(), 0);
    assert_eq!(f.voice.spoken(), vec!["São 10:00.".to_owned()]);
}

#[tokio::test]
async fn open_app_extracts_the_application_name() {
    let mut f = fixture(&[], &[]);
    f.assistant.handle_utterance("stuart abra o navegador").await;

    assert_eq!(f.open_app.calls(), vec![Some(serde_json::json!("navegador"))]);
    assert_eq!(f.service.call_count(), 0);
}

#[tokio::test]
async fn cancel_never_reaches_the_router() {
    let mut f = fixture(&[], &[]);
    f.assistant.handle_utterance("stuart cancelar").await;

    assert_eq!(f.cancel_shutdown.calls().len(), 1);
    assert_eq!(f.service.call_count(), 0);
}

#[tokio::test]
async fn open_question_goes_through_the_semantic_router() {
    let mut f = fixture(&[r#"{"tool": "wikipedia", "args": "Marie Curie"}"#], &[]);
    f.assistant
        .handle_utterance("stuart quem foi Marie Curie")
        .await;

    assert_eq!(f.service.call_count(), 1);
    assert_eq!(
        f.wikipedia.calls(),
        vec![Some(serde_json::json!("Marie Curie"))]
    );
    assert_eq!(
        f.voice.spoken(),
        vec!["Marie Curie foi uma física polonesa.".to_owned()]
    );

    let history = f.assistant.handler().memory().get_formatted_history();
    assert!(history.contains("Usuário: quem foi marie curie"));
    assert!(history.contains("Stuart: Marie Curie foi uma física polonesa."));
}

#[tokio::test]
async fn bare_keyword_invites_a_command() {
    let mut f = fixture(&[], &[]);
    let signal = f.assistant.handle_utterance("stuart").await;

    assert!(signal.is_none());
    assert_eq!(f.voice.spoken(), vec!["Sim, em que posso ajudar?".to_owned()]);
    // The invitation is not a routed turn: no routing, no memory mutation.
    assert_eq!(f.service.call_count(), 0);
    assert!(f.assistant.handler().memory().is_empty());
}

#[tokio::test]
async fn utterances_without_the_keyword_produce_nothing() {
    let mut f = fixture(&[], &[]);
    let signal = f.assistant.handle_utterance("hoje o dia está bonito").await;

    assert!(signal.is_none());
    assert!(f.voice.spoken().is_empty());
    assert!(f.assistant.handler().memory().is_empty());
    assert_eq!(f.service.call_count(), 0);
}

#[tokio::test]
async fn fuzzy_wake_word_still_dispatches() {
    let mut f = fixture(&[], &[]);
    let signal = f.assistant.handle_utterance("stewart sair").await;

    assert_eq!(signal, Some(ControlSignal::Quit));
    assert_eq!(f.quit.calls().len(), 1);
}

#[tokio::test]
async fn listen_loop_runs_until_quit() {
    let mut f = fixture(
        &[],
        &[
            "hoje o dia está bonito",
            "stuart que horas são",
            "stuart sair",
        ],
    );

    f.assistant.run().await.unwrap();

    // The non-command utterance was ignored, the time command answered,
    // and the quit command ended the loop before the script ran out.
    assert_eq!(f.time.calls().len(), 1);
    assert_eq!(f.quit.calls().len(), 1);
    assert_eq!(f.voice.spoken(), vec!["São 10:00.".to_owned()]);
}

#[tokio::test]
async fn missing_audio_device_is_fatal_and_spoken() {
    struct BrokenInput;
    impl AudioInput for BrokenInput {
        fn open(&self) -> Result<()> {
            Err(AssistantError::AudioDevice("no such device".to_owned()))
        }
        fn listen(&self, _opts: &ListenOptions) -> Result<AudioClip> {
            Err(AssistantError::AudioDevice("no such device".to_owned()))
        }
    }

    let config = AssistantConfig::default();
    let voice = RecordingVoice::new();
    let service = ScriptedService::answering(&[]);
    let registry = ToolRegistry::new();
    let router = SemanticRouter::new(
        service as Arc<dyn CompletionService>,
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

    let mut assistant = Assistant::new(
        &config,
        handler,
        Arc::new(BrokenInput),
        Arc::new(PassthroughTranscriber),
        Arc::clone(&voice) as Arc<dyn SpeechSynthesizer>,
    );

    let outcome = assistant.run().await;
    assert!(matches!(outcome, Err(AssistantError::AudioDevice(_))));
    assert_eq!(
        f_spoken_last(&voice),
        Some("Erro crítico: não consegui encontrar um microfone funcional.".to_owned())
    );
}

fn f_spoken_last(voice: &RecordingVoice) -> Option<String> {
    voice.spoken().last().cloned()
}
