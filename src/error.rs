//! Error types for the assistant core.

/// Top-level error type for the assistant.
///
/// The dispatcher is the error boundary for a turn: nothing in this enum is
/// allowed to escape `CommandHandler::process`. The two LLM variants are
/// distinguished because the dispatcher degrades them differently — an
/// unparseable router response falls back to a web search, an unreachable
/// endpoint falls back to general chat.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Audio device could not be opened or used.
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// Nothing was heard before the listen timeout elapsed.
    #[error("no speech detected")]
    NoSpeech,

    /// Speech-to-text transcription failure.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// The language-model endpoint could not be reached.
    #[error("LLM connection error: {0}")]
    LlmConnection(String),

    /// The language model answered, but the response could not be parsed.
    #[error("invalid LLM response: {0}")]
    LlmResponse(String),

    /// Tool execution failure.
    #[error("tool error: {0}")]
    Tool(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task failed to run to completion.
    #[error("task error: {0}")]
    Task(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
