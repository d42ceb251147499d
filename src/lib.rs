//! Persona chat on a locally hosted model
//!
//! Manages the lifecycle of a single inference engine and answers chat turns
//! in the voice of a persona learned from user-supplied transcripts.

pub mod config;
pub mod engine;
pub mod prompt;
pub mod session;

pub use config::{AppConfig, ConfigError};
pub use engine::{EngineLauncher, InferenceEngine, ModelKey};
pub use prompt::{build_system_prompt, ConversationTurn, PersonaConfig, TurnRole};
pub use session::{
    LoadProgress, ModelLoadError, ProgressSink, RespondError, SessionConfig, SessionManager,
    SessionStatus,
};
