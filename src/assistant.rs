//! Continuous listen → wake → dispatch cycle.
//!
//! A single cooperative task drives the whole loop; microphone capture and
//! transcription run on worker threads so the scheduler is never blocked
//! for the multi-second durations those calls can take. Commands are
//! strictly one-at-a-time: the loop does not re-enter the listen state
//! until dispatch completes.

use crate::config::AssistantConfig;
use crate::dispatch::CommandHandler;
use crate::error::{AssistantError, Result};
use crate::speech::{AudioInput, ListenOptions, SpeechSynthesizer, Transcriber};
use crate::tools::ControlSignal;
use crate::wake::WakeWordDetector;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Backoff after an audio device failure before reopening the microphone.
const AUDIO_RETRY_BACKOFF: Duration = Duration::from_secs(5);
/// Backoff after a transcription failure.
const TRANSCRIPTION_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// The assistant: wake-word gate in front of the dispatcher, fed by the
/// capture/transcription boundary.
pub struct Assistant {
    detector: WakeWordDetector,
    handler: CommandHandler,
    input: Arc<dyn AudioInput>,
    transcriber: Arc<dyn Transcriber>,
    voice: Arc<dyn SpeechSynthesizer>,
    language: String,
    listen_opts: ListenOptions,
    prompt_bias: String,
    cancel: CancellationToken,
}

impl Assistant {
    #[must_use]
    pub fn new(
        config: &AssistantConfig,
        handler: CommandHandler,
        input: Arc<dyn AudioInput>,
        transcriber: Arc<dyn Transcriber>,
        voice: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let detector =
            WakeWordDetector::new(&config.assistant.keyword, config.wake.confidence);
        let listen_opts = ListenOptions {
            timeout: None,
            phrase_limit: Duration::from_secs(u64::from(config.listen.phrase_time_limit_s)),
        };
        let prompt_bias = transcription_bias(
            &config.assistant.display_name,
            &config.assistant.keyword,
        );

        Self {
            detector,
            handler,
            input,
            transcriber,
            voice,
            language: config.assistant.language.clone(),
            listen_opts,
            prompt_bias,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the listen loop (e.g. from a Ctrl+C handler).
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Read access to the dispatcher (and through it, the memory).
    #[must_use]
    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    /// Gate one transcribed utterance through the wake-word detector and,
    /// when it qualifies, dispatch the residual command.
    ///
    /// Utterances without the wake word produce nothing at all. The bare
    /// keyword produces a spoken invitation and no routing.
    pub async fn handle_utterance(&mut self, text: &str) -> Option<ControlSignal> {
        let command = self.detector.detect(text)?;

        if command.is_empty() {
            info!("wake word alone, inviting a command");
            self.say("Sim, em que posso ajudar?").await;
            return None;
        }

        info!("wake word detected, command: '{command}'");
        self.handler.process(&command).await
    }

    /// Run the continuous listen loop until quit or cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal startup conditions (no usable audio
    /// device); everything after startup is contained and retried.
    pub async fn run(&mut self) -> Result<()> {
        // Probe the device up front: a machine without a microphone should
        // abort with a clear message, not spin silently.
        let input = Arc::clone(&self.input);
        let probe = tokio::task::spawn_blocking(move || input.open())
            .await
            .map_err(|e| AssistantError::Task(format!("audio probe worker: {e}")))?;
        if let Err(e) = probe {
            error!("no usable audio input device: {e}");
            self.say("Erro crítico: não consegui encontrar um microfone funcional.")
                .await;
            return Err(e);
        }

        info!("listening for keyword '{}'", self.detector.keyword());

        loop {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, leaving the listen loop");
                break;
            }

            match self.capture_and_transcribe().await {
                Ok(text) => {
                    let text = text.trim().to_owned();
                    if text.is_empty() {
                        continue;
                    }
                    debug!("heard: {text}");
                    if self.handle_utterance(&text).await == Some(ControlSignal::Quit) {
                        info!("quit requested, leaving the listen loop");
                        break;
                    }
                }
                Err(AssistantError::NoSpeech) => {
                    debug!("listen timed out, listening again");
                }
                Err(AssistantError::AudioDevice(e)) => {
                    error!("audio device error: {e}");
                    self.say("Tive um problema com o microfone. Tentando reconectar...")
                        .await;
                    tokio::time::sleep(AUDIO_RETRY_BACKOFF).await;
                }
                Err(AssistantError::Transcription(e)) => {
                    error!("transcription error: {e}");
                    self.say("Desculpe, tive um problema ao processar sua voz.")
                        .await;
                    tokio::time::sleep(TRANSCRIPTION_RETRY_BACKOFF).await;
                }
                Err(e) => {
                    error!("unexpected listen-loop error: {e}");
                    tokio::time::sleep(TRANSCRIPTION_RETRY_BACKOFF).await;
                }
            }
        }

        Ok(())
    }

    /// One capture + transcription cycle on a worker thread.
    async fn capture_and_transcribe(&self) -> Result<String> {
        let input = Arc::clone(&self.input);
        let transcriber = Arc::clone(&self.transcriber);
        let opts = self.listen_opts;
        let language = self.language.clone();
        let bias = self.prompt_bias.clone();

        tokio::task::spawn_blocking(move || {
            let clip = input.listen(&opts)?;
            transcriber.transcribe(&clip, &language, Some(&bias))
        })
        .await
        .map_err(|e| AssistantError::Task(format!("listen worker: {e}")))?
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.voice.speak(text).await {
            error!("speech synthesis failed: {e}");
        }
    }
}

/// Domain-vocabulary hint handed to the transcriber so in-domain words
/// (above all the wake word) are recognized more reliably.
fn transcription_bias(display_name: &str, keyword: &str) -> String {
    format!(
        "Transcrição de comandos de voz para o assistente virtual {display_name}. \
         Palavras-chave: {keyword}, abrir, pesquisar, agendar, hora, data, clima, \
         cancelar, desligar, piada."
    )
}
