//! Inference engine abstraction
//!
//! The engine itself (tokenizer, kernels, sampling) lives outside this crate.
//! These traits describe the capability the session manager consumes.

mod error;
pub mod models;
mod openai;
mod types;

pub use error::{EngineError, EngineErrorKind};
pub use models::{all_models, default_model, find_model, ModelChoice, ModelDef};
pub use openai::{OpenAICompatEngine, OpenAICompatLauncher};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Receives engine-specific progress reports during a launch
pub type EngineReport<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// A loaded model that answers chat completions
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Run a chat completion over the full message list
    ///
    /// # Errors
    ///
    /// [`EngineErrorKind::Unloaded`] after [`Self::unload`], otherwise
    /// whatever the runtime reports.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Completion, EngineError>;

    /// Release the model. The handle must not be used afterwards.
    ///
    /// # Errors
    ///
    /// The runtime failed to release resources. Callers drop the handle
    /// regardless.
    async fn unload(&self) -> Result<(), EngineError>;

    /// The model this engine was created for
    fn model_key(&self) -> &ModelKey;
}

/// Creates engines for a model key
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Load `model`, forwarding the runtime's own progress text to `report`
    ///
    /// # Errors
    ///
    /// The model is unknown to the runtime or could not be loaded.
    async fn launch(
        &self,
        model: &ModelKey,
        report: EngineReport<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, EngineError>;
}

/// Logging wrapper for engines
pub struct LoggingEngine {
    inner: Arc<dyn InferenceEngine>,
}

impl LoggingEngine {
    #[must_use]
    pub fn new(inner: Arc<dyn InferenceEngine>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl InferenceEngine for LoggingEngine {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Completion, EngineError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(messages, params).await;
        let duration = start.elapsed();

        match &result {
            Ok(completion) => {
                let usage = completion.usage.unwrap_or_default();
                tracing::info!(
                    model = %self.inner.model_key(),
                    duration_ms = %duration.as_millis(),
                    messages = messages.len(),
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Completion finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.inner.model_key(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Completion failed"
                );
            }
        }

        result
    }

    async fn unload(&self) -> Result<(), EngineError> {
        let result = self.inner.unload().await;
        match &result {
            Ok(()) => tracing::info!(model = %self.inner.model_key(), "Engine unloaded"),
            Err(e) => tracing::warn!(
                model = %self.inner.model_key(),
                error = %e.message,
                "Engine unload failed"
            ),
        }
        result
    }

    fn model_key(&self) -> &ModelKey {
        self.inner.model_key()
    }
}
