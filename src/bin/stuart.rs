//! Console binary for the assistant.
//!
//! The voice subsystems (capture, transcription, synthesis) are external
//! collaborators; this binary wires the routing core to the terminal
//! instead — typed utterances in, printed speech out. The wake-word gate,
//! dispatcher, semantic router, and tools are exactly the ones a voice
//! front-end embeds.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stuart::assistant::Assistant;
use stuart::config::AssistantConfig;
use stuart::dispatch::CommandHandler;
use stuart::error::AssistantError;
use stuart::llm::OllamaChat;
use stuart::memory::ConversationMemory;
use stuart::router::SemanticRouter;
use stuart::speech::{
    AudioClip, AudioInput, Confirmation, ListenOptions, SpeechSynthesizer, Transcriber,
    contains_affirmative,
};
use stuart::tools::{ControlSignal, SENTINEL_CATALOGUE, builtin_registry};
use tracing_subscriber::EnvFilter;

/// Stuart: voice-activated personal assistant.
#[derive(Parser)]
#[command(name = "stuart", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Interactive console session (typed utterances, printed speech).
    Console,

    /// Print the tool catalogue the semantic router is prompted with.
    Catalogue,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress noisy dependency logs by default; override with RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stuart=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        AssistantConfig::from_file(path)?
    } else {
        AssistantConfig::default()
    };

    match cli.command.unwrap_or(Command::Console) {
        Command::Console => run_console(config).await,
        Command::Catalogue => print_catalogue(config),
    }
}

/// Speech synthesis to the terminal.
struct ConsoleVoice {
    name: String,
}

#[async_trait]
impl SpeechSynthesizer for ConsoleVoice {
    async fn speak(&self, text: &str) -> stuart::Result<()> {
        println!("[{}] {text}", self.name);
        Ok(())
    }
}

/// Confirmation prompt over stdin.
struct ConsoleConfirmation {
    name: String,
}

#[async_trait]
impl Confirmation for ConsoleConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        println!("[{}] {prompt} (sim/não)", self.name);
        match read_line().await {
            Some(answer) => contains_affirmative(&answer),
            None => false,
        }
    }
}

/// Audio boundary stand-ins: the console session never captures audio, and
/// asking it to is a device error, same as a missing microphone.
struct NoAudio;

impl AudioInput for NoAudio {
    fn open(&self) -> stuart::Result<()> {
        Err(AssistantError::AudioDevice(
            "console session has no audio input".to_owned(),
        ))
    }

    fn listen(&self, _opts: &ListenOptions) -> stuart::Result<AudioClip> {
        Err(AssistantError::AudioDevice(
            "console session has no audio input".to_owned(),
        ))
    }
}

struct NoTranscriber;

impl Transcriber for NoTranscriber {
    fn transcribe(
        &self,
        _clip: &AudioClip,
        _language: &str,
        _prompt_bias: Option<&str>,
    ) -> stuart::Result<String> {
        Err(AssistantError::Transcription(
            "console session has no transcriber".to_owned(),
        ))
    }
}

async fn run_console(config: AssistantConfig) -> anyhow::Result<()> {
    let display_name = config.assistant.display_name.clone();
    println!("{display_name} v{}", env!("CARGO_PKG_VERSION"));

    let voice = Arc::new(ConsoleVoice {
        name: display_name.clone(),
    });
    let confirm = Arc::new(ConsoleConfirmation {
        name: display_name.clone(),
    });

    let registry = builtin_registry(&config, voice.clone(), confirm);
    let catalogue = format!("{}\n{}", registry.catalogue(), SENTINEL_CATALOGUE);

    let service = Arc::new(OllamaChat::router(&config.llm));
    let router = SemanticRouter::new(service, display_name.clone(), catalogue);
    let memory = ConversationMemory::new(config.memory.window_size, display_name.clone());
    let handler = CommandHandler::new(registry, router, memory, voice.clone())?;

    let mut assistant = Assistant::new(
        &config,
        handler,
        Arc::new(NoAudio),
        Arc::new(NoTranscriber),
        voice,
    );

    println!(
        "Digite \"{}\" seguido de um comando. Ctrl+D encerra.\n",
        config.assistant.keyword
    );

    while let Some(line) = read_line().await {
        let line = line.trim().to_owned();
        if line.is_empty() {
            continue;
        }
        if assistant.handle_utterance(&line).await == Some(ControlSignal::Quit) {
            break;
        }
    }

    Ok(())
}

fn print_catalogue(config: AssistantConfig) -> anyhow::Result<()> {
    let voice = Arc::new(ConsoleVoice {
        name: config.assistant.display_name.clone(),
    });
    let confirm = Arc::new(ConsoleConfirmation {
        name: config.assistant.display_name.clone(),
    });
    let registry = builtin_registry(&config, voice, confirm);
    println!("{}\n{}", registry.catalogue(), SENTINEL_CATALOGUE);
    Ok(())
}

/// Read one line from stdin on a worker thread. `None` on EOF.
async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}
