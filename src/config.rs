//! Configuration types for the assistant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Core assistant identity (keyword, language, display name).
    pub assistant: CoreConfig,
    /// Wake-word detection settings.
    pub wake: WakeConfig,
    /// Microphone listen settings.
    pub listen: ListenConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Conversation memory settings.
    pub memory: MemoryConfig,
    /// Spoken-alias → executable table for the open-app command.
    pub apps: AppsConfig,
    /// Persistent storage paths (calendar, indexed documents).
    pub storage: StorageConfig,
}

/// Assistant identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Wake word that must be present for an utterance to become a command.
    pub keyword: String,
    /// Language code used for transcription hints and the Wikipedia endpoint.
    pub language: String,
    /// Display name used in conversation transcripts and console output.
    pub display_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            keyword: "stuart".to_owned(),
            language: "pt".to_owned(),
            display_name: "Stuart".to_owned(),
        }
    }
}

/// Wake-word detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// Fuzzy-match confidence threshold (0–100).
    ///
    /// When no exact keyword substring is found, the best-scoring token of
    /// the utterance must reach this similarity score to count as the wake
    /// word. 100 means exact-only.
    ///   - 60: lenient (more false activations)
    ///   - 70: balanced (default)
    ///   - 85: strict (misses mild mispronunciations)
    pub confidence: u8,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self { confidence: 70 }
    }
}

/// Microphone listen configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Maximum seconds to record a single phrase in the main loop.
    pub phrase_time_limit_s: u32,
    /// Seconds to wait for speech to start during a confirmation prompt.
    pub confirmation_timeout_s: u32,
    /// Maximum seconds to record a confirmation answer.
    pub confirmation_phrase_limit_s: u32,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            phrase_time_limit_s: 10,
            confirmation_timeout_s: 5,
            confirmation_phrase_limit_s: 3,
        }
    }
}

/// Language model configuration.
///
/// Points at an OpenAI-compatible chat-completions server (Ollama by
/// default). The router model is typically a much smaller model than the
/// chat model since it only emits a one-line JSON decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint host.
    pub host: String,
    /// Endpoint port.
    pub port: u16,
    /// Model used for general completions.
    pub model: String,
    /// Model used for semantic routing decisions.
    pub router_model: String,
    /// Sampling temperature.
    pub temperature: f64,
}

impl LlmConfig {
    /// Base URL of the endpoint, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 11434,
            model: "gemma3:latest".to_owned(),
            router_model: "qwen2.5:0.5b".to_owned(),
            temperature: 0.7,
        }
    }
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Number of turns kept in the rolling window. Oldest entries are
    /// evicted first once the window is full.
    pub window_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { window_size: 10 }
    }
}

/// Spoken-alias → executable lookup for the open-app command.
///
/// Keyed by the alias the user speaks, then by platform (`linux`,
/// `macos`, `windows`, matching `std::env::consts::OS`). Loaded once at
/// startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppsConfig {
    /// alias → (os → executable name).
    pub aliases: HashMap<String, HashMap<String, String>>,
}

impl AppsConfig {
    /// Resolve a spoken alias for the current platform.
    #[must_use]
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.resolve_for(alias, std::env::consts::OS)
    }

    /// Resolve a spoken alias for an explicit platform.
    #[must_use]
    pub fn resolve_for(&self, alias: &str, os: &str) -> Option<&str> {
        self.aliases
            .get(alias)
            .and_then(|by_os| by_os.get(os))
            .map(String::as_str)
    }
}

impl Default for AppsConfig {
    fn default() -> Self {
        let mut aliases = HashMap::new();
        aliases.insert(
            "navegador".to_owned(),
            HashMap::from([
                ("linux".to_owned(), "firefox".to_owned()),
                ("windows".to_owned(), "firefox".to_owned()),
                ("macos".to_owned(), "Firefox".to_owned()),
            ]),
        );
        aliases.insert(
            "editor de código".to_owned(),
            HashMap::from([
                ("linux".to_owned(), "code".to_owned()),
                ("windows".to_owned(), "code".to_owned()),
                ("macos".to_owned(), "Visual Studio Code".to_owned()),
            ]),
        );
        Self { aliases }
    }
}

/// Persistent storage paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding calendar events.
    pub calendar_path: PathBuf,
    /// Directory holding indexed plain-text documents.
    pub documents_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = default_data_dir();
        Self {
            calendar_path: root.join("calendar.json"),
            documents_dir: root.join("documents"),
        }
    }
}

/// Returns the default persistent data directory.
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stuart")
}

impl AssistantConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::error::AssistantError::Config(format!("invalid config: {e}")))
    }
}
