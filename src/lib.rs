//! Stuart: voice-activated personal assistant.
//!
//! This crate provides the command-routing core of a wake-word assistant:
//! Utterance → wake-word gate → dispatcher → [system routes | semantic router] → tool
//!
//! # Architecture
//!
//! The core is built from small, independently testable pieces:
//! - **Wake-word detector**: Gates transcribed utterances on the keyword
//!   (exact or fuzzy match) and strips it from the command
//! - **Dispatcher**: Hybrid routing — an ordered regex table for
//!   safety/latency-critical system commands, then an LLM-driven semantic
//!   router for everything else
//! - **Semantic router**: Converts a free-form command plus conversation
//!   history into a structured `{tool, args}` decision
//! - **Tool registry**: Named async handlers with a uniform contract
//! - **Conversation memory**: Bounded FIFO log of user/assistant turns
//!
//! Audio capture, transcription, and speech synthesis are external
//! collaborators behind the traits in [`speech`].

pub mod assistant;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod memory;
pub mod router;
pub mod speech;
pub mod tools;
pub mod wake;

pub use assistant::Assistant;
pub use config::AssistantConfig;
pub use dispatch::CommandHandler;
pub use error::{AssistantError, Result};
pub use router::SemanticRouter;
pub use tools::{ControlSignal, ToolRegistry};
pub use wake::WakeWordDetector;
