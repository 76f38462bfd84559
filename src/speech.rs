//! Boundary contracts for the excluded audio subsystems.
//!
//! Capture, transcription, and synthesis are external collaborators; the
//! core only depends on the traits here. Capture and transcription are
//! blocking by contract — the assistant loop and the confirmation cycle run
//! them under `spawn_blocking`. Synthesis is async and must complete (audio
//! played or handed off) before returning, because callers sequence prompts
//! against it ("are you sure?" before listening for the answer).

use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Opaque captured audio, handed from capture to transcription.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
}

/// Bounds for one listen cycle.
#[derive(Debug, Clone, Copy)]
pub struct ListenOptions {
    /// How long to wait for speech to start. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Maximum length of the recorded phrase.
    pub phrase_limit: Duration,
}

/// Microphone capture. Blocking; the device is exclusively owned by the
/// caller for the duration of each capture.
pub trait AudioInput: Send + Sync {
    /// Probe the device. Called once at startup so a missing microphone is
    /// a clear fatal error instead of a silent retry loop.
    ///
    /// # Errors
    ///
    /// `AudioDevice` when the device cannot be opened.
    fn open(&self) -> Result<()>;

    /// Record one phrase.
    ///
    /// # Errors
    ///
    /// `NoSpeech` when the timeout elapses without speech — a normal
    /// condition, not a failure. `AudioDevice` when the device breaks.
    fn listen(&self, opts: &ListenOptions) -> Result<AudioClip>;
}

/// Speech-to-text. Blocking.
pub trait Transcriber: Send + Sync {
    /// Transcribe a clip. `prompt_bias` is a short natural-language hint
    /// listing domain vocabulary to improve in-domain recognition. Silence
    /// or noise must come back as empty text, not an error.
    ///
    /// # Errors
    ///
    /// `Transcription` when the model itself fails.
    fn transcribe(
        &self,
        clip: &AudioClip,
        language: &str,
        prompt_bias: Option<&str>,
    ) -> Result<String>;
}

/// Text-to-speech synthesis plus playback.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, returning once playback finished or was handed off.
    ///
    /// # Errors
    ///
    /// Implementation-defined; callers log and continue, a lost utterance
    /// never fails a turn.
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Yes/no confirmation prompt.
#[async_trait]
pub trait Confirmation: Send + Sync {
    /// Ask `prompt` and interpret the answer. Anything that is not a clear
    /// affirmative — including timeouts and errors — is `false`.
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Voice-driven confirmation: speak the prompt, then one bounded
/// listen+transcribe cycle.
pub struct VoiceConfirmation {
    voice: Arc<dyn SpeechSynthesizer>,
    input: Arc<dyn AudioInput>,
    transcriber: Arc<dyn Transcriber>,
    language: String,
    timeout: Duration,
    phrase_limit: Duration,
}

impl VoiceConfirmation {
    /// Build a confirmation service with the configured listen bounds
    /// (shorter than the main loop's, since the answer is one word).
    #[must_use]
    pub fn from_config(
        config: &crate::config::AssistantConfig,
        voice: Arc<dyn SpeechSynthesizer>,
        input: Arc<dyn AudioInput>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self::new(
            voice,
            input,
            transcriber,
            config.assistant.language.clone(),
            Duration::from_secs(u64::from(config.listen.confirmation_timeout_s)),
            Duration::from_secs(u64::from(config.listen.confirmation_phrase_limit_s)),
        )
    }

    #[must_use]
    pub fn new(
        voice: Arc<dyn SpeechSynthesizer>,
        input: Arc<dyn AudioInput>,
        transcriber: Arc<dyn Transcriber>,
        language: impl Into<String>,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Self {
        Self {
            voice,
            input,
            transcriber,
            language: language.into(),
            timeout,
            phrase_limit,
        }
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.voice.speak(text).await {
            error!("speech synthesis failed: {e}");
        }
    }
}

#[async_trait]
impl Confirmation for VoiceConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        self.say(prompt).await;

        let input = Arc::clone(&self.input);
        let transcriber = Arc::clone(&self.transcriber);
        let language = self.language.clone();
        let opts = ListenOptions {
            timeout: Some(self.timeout),
            phrase_limit: self.phrase_limit,
        };

        let heard = tokio::task::spawn_blocking(move || {
            let clip = input.listen(&opts)?;
            transcriber.transcribe(
                &clip,
                &language,
                Some("Confirmação. Responda apenas Sim ou Não."),
            )
        })
        .await
        .unwrap_or_else(|e| Err(AssistantError::Task(format!("confirmation worker: {e}"))));

        match heard {
            Ok(text) => {
                info!("confirmation response: '{}'", text.trim());
                contains_affirmative(&text)
            }
            Err(AssistantError::NoSpeech) => {
                warn!("no confirmation heard before timeout");
                false
            }
            Err(AssistantError::AudioDevice(e)) => {
                error!("audio device error during confirmation: {e}");
                self.say("Desculpe, não consegui acessar o microfone.").await;
                false
            }
            Err(AssistantError::Transcription(e)) => {
                error!("transcription error during confirmation: {e}");
                self.say("Desculpe, tive um problema ao processar sua voz.")
                    .await;
                false
            }
            Err(e) => {
                error!("confirmation failed: {e}");
                false
            }
        }
    }
}

/// Whether the transcript contains the affirmative token ("sim") as a
/// standalone word. Substring checks would accept words like "péssimo".
#[must_use]
pub fn contains_affirmative(text: &str) -> bool {
    text.to_lowercase()
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .any(|token| token == "sim")
}
