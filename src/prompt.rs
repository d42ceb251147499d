//! Persona prompt assembly
//!
//! Builds the system prompt that conditions the engine on a persona's
//! speaking style, and prepends it to the conversation history.
//!
//! Name and training data are interpolated verbatim: no escaping, no
//! length caps.

use crate::engine::ChatMessage;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

/// Used when the persona has no name
pub const DEFAULT_PERSONA_NAME: &str = "AI assistant";

/// Used when no training data was supplied
pub const NO_TRAINING_DATA: &str = "(No specific data provided, be gentle and helpful)";

/// Separates successive imports in the training data
const IMPORT_SEPARATOR: &str = "\n\n=== imported file ===\n";

const INSTRUCTIONS: &str = "Instructions:
1. Reply to the user's last message using the style from the data.
2. Keep it short and conversational (like a chat app).
3. Do NOT mention you are an AI or a language model.
4. Mirror the tone of the data: if it uses emojis, use them. If it's rude or uses profanity, be rude.";

/// The character the engine should imitate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    pub training_data: String,
}

impl PersonaConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, training_data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            training_data: training_data.into(),
        }
    }

    /// Append imported transcript text to the training data
    pub fn append_training_text(&mut self, text: &str) {
        if !self.training_data.is_empty() {
            self.training_data.push_str(IMPORT_SEPARATOR);
        }
        self.training_data.push_str(text);
    }

    /// Read a UTF-8 transcript file and append it, returning its size in bytes
    ///
    /// # Errors
    ///
    /// Any I/O or UTF-8 decoding error from reading `path`. Training data
    /// is left unchanged in that case.
    pub fn import_training_file(&mut self, path: &Path) -> std::io::Result<usize> {
        let text = std::fs::read_to_string(path)?;
        self.append_training_text(&text);
        tracing::info!(path = %path.display(), bytes = text.len(), "Imported training data");
        Ok(text.len())
    }
}

/// Who spoke a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of conversation history, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    fn to_message(&self) -> ChatMessage {
        match self.role {
            TurnRole::User => ChatMessage::user(self.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

/// Build the persona system prompt. Pure and deterministic.
#[must_use]
pub fn build_system_prompt(persona: &PersonaConfig) -> String {
    let name = if persona.name.is_empty() {
        DEFAULT_PERSONA_NAME
    } else {
        persona.name.as_str()
    };
    let data = if persona.training_data.is_empty() {
        NO_TRAINING_DATA
    } else {
        persona.training_data.as_str()
    };

    let mut prompt = String::from("You are a roleplay AI.\n");
    let _ = writeln!(prompt, "Your name is: {name}.");
    prompt.push_str(
        "\nTask: Imitate the speaking style found in the training data below perfectly.\n",
    );
    prompt.push_str("Context (Training Data):\n=== START DATA ===\n");
    prompt.push_str(data);
    prompt.push_str("\n=== END DATA ===\n\n");
    prompt.push_str(INSTRUCTIONS);
    prompt.push('\n');
    prompt
}

/// System prompt followed by the history, in order
#[must_use]
pub fn assemble_messages(persona: &PersonaConfig, history: &[ConversationTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(build_system_prompt(persona)));
    messages.extend(history.iter().map(ConversationTurn::to_message));
    messages
}
