//! Session error types

use crate::engine::{EngineError, EngineErrorKind, ModelKey};
use thiserror::Error;

/// Engine creation failed. The session is empty afterwards.
#[derive(Debug, Clone, Error)]
#[error("failed to load model {model}: {source}")]
pub struct ModelLoadError {
    pub model: ModelKey,
    #[source]
    pub source: EngineError,
}

impl ModelLoadError {
    #[must_use]
    pub fn new(model: ModelKey, source: EngineError) -> Self {
        Self { model, source }
    }

    #[must_use]
    pub fn kind(&self) -> EngineErrorKind {
        self.source.kind
    }
}

/// Soft failures of `respond`. The `Display` text is what the chat shows.
#[derive(Debug, Clone, Error)]
pub enum RespondError {
    #[error("Error: the model is not loaded yet. Select a model and load it first.")]
    NotLoaded,
    #[error("(local inference failed: {0})")]
    Generation(#[source] EngineError),
}
