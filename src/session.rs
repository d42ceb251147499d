//! Model session lifecycle
//!
//! [`SessionManager`] owns at most one active inference engine and the key
//! of the model it serves. Loads are serialized: a second
//! `ensure_model_loaded` waits for the first to settle and then runs
//! against the resulting state, so a repeat request for the model that just
//! loaded short-circuits. `respond` only reads the session.

mod error;
mod progress;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{ModelLoadError, RespondError};
pub use progress::{
    ignore_progress, progress_channel, ChannelProgress, LoadProgress, ProgressSink, SessionStatus,
};

use crate::engine::{
    EngineError, EngineLauncher, InferenceEngine, LoggingEngine, ModelKey, SamplingParams,
};
use crate::prompt::{assemble_messages, ConversationTurn, PersonaConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Shown when the engine produced no text
pub const EMPTY_REPLY_PLACEHOLDER: &str = "...";

/// Tunables for a session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sampling: SamplingParams,
    /// Upper bound on engine creation, and separately on unloading the
    /// replaced engine; `None` waits indefinitely
    pub load_timeout: Option<Duration>,
}

impl SessionConfig {
    pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(600);
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingParams::default(),
            load_timeout: Some(Self::DEFAULT_LOAD_TIMEOUT),
        }
    }
}

/// A loaded engine together with the key it was loaded for
#[derive(Clone)]
pub struct ActiveEngine {
    pub model: ModelKey,
    pub engine: Arc<dyn InferenceEngine>,
}

/// The manager's record of which model, if any, is loaded.
///
/// Key and engine live in one `Option`, so either both are present or
/// neither is.
#[derive(Clone, Default)]
pub struct EngineSession {
    active: Option<ActiveEngine>,
}

impl EngineSession {
    #[must_use]
    pub fn active_model_key(&self) -> Option<&ModelKey> {
        self.active.as_ref().map(|a| &a.model)
    }

    #[must_use]
    pub fn engine(&self) -> Option<Arc<dyn InferenceEngine>> {
        self.active.as_ref().map(|a| Arc::clone(&a.engine))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    fn install(&mut self, active: ActiveEngine) {
        self.active = Some(active);
    }

    fn take(&mut self) -> Option<ActiveEngine> {
        self.active.take()
    }
}

/// Publishes `Loading` for the duration of a load.
///
/// If the load future is dropped before it settles, the session is already
/// empty, so the status falls back to `Empty`.
struct LoadingStatus<'a> {
    status: &'a watch::Sender<SessionStatus>,
    settled: bool,
}

impl<'a> LoadingStatus<'a> {
    fn publish(status: &'a watch::Sender<SessionStatus>, model: &ModelKey) -> Self {
        status.send_replace(SessionStatus::Loading {
            model: model.clone(),
        });
        Self {
            status,
            settled: false,
        }
    }

    fn settle(mut self, outcome: SessionStatus) {
        self.status.send_replace(outcome);
        self.settled = true;
    }
}

impl Drop for LoadingStatus<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.status.send_replace(SessionStatus::Empty);
        }
    }
}

/// Owns the engine session and mediates loads and completions
pub struct SessionManager {
    launcher: Arc<dyn EngineLauncher>,
    config: SessionConfig,
    session: RwLock<EngineSession>,
    /// Held for the whole of a load so loads never overlap
    load_gate: Mutex<()>,
    status: watch::Sender<SessionStatus>,
}

impl SessionManager {
    #[must_use]
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: SessionConfig) -> Self {
        let (status, _) = watch::channel(SessionStatus::Empty);
        Self {
            launcher,
            config,
            session: RwLock::new(EngineSession::default()),
            load_gate: Mutex::new(()),
            status,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> EngineSession {
        self.session.read().await.clone()
    }

    pub async fn active_model_key(&self) -> Option<ModelKey> {
        self.session.read().await.active_model_key().cloned()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes, e.g. to detect a stalled load
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Make `requested` the active model, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ModelLoadError`] when the engine cannot be created or the
    /// load times out. The session is empty afterwards.
    pub async fn ensure_model_loaded(
        &self,
        requested: &ModelKey,
        progress: &dyn ProgressSink,
    ) -> Result<(), ModelLoadError> {
        self.ensure_model_loaded_with_cancel(requested, progress, CancellationToken::new())
            .await
    }

    /// Like [`Self::ensure_model_loaded`], abandoning the unload of the
    /// previous model and engine creation when `cancel` fires. A cancelled
    /// load leaves the session empty.
    ///
    /// # Errors
    ///
    /// Returns [`ModelLoadError`] when the engine cannot be created, times
    /// out, or is cancelled. The session is empty afterwards.
    pub async fn ensure_model_loaded_with_cancel(
        &self,
        requested: &ModelKey,
        progress: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<(), ModelLoadError> {
        let _gate = self.load_gate.lock().await;

        let previous = {
            let mut session = self.session.write().await;
            if session.active_model_key() == Some(requested) {
                tracing::debug!(model = %requested, "Model already loaded");
                progress.emit(LoadProgress::AlreadyReady {
                    model: requested.clone(),
                });
                return Ok(());
            }
            session.take()
        };

        let loading = LoadingStatus::publish(&self.status, requested);

        if let Some(previous) = previous {
            progress.emit(LoadProgress::Unloading {
                previous: previous.model.clone(),
            });
            tracing::info!(previous = %previous.model, next = %requested, "Switching models");
            self.release(&previous, &cancel).await;
        }

        progress.emit(LoadProgress::Initializing {
            model: requested.clone(),
        });
        tracing::info!(model = %requested, "Loading model");

        let start = std::time::Instant::now();
        let launched = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(EngineError::cancelled(format!(
                "Loading {requested} was cancelled"
            ))),
            result = self.launch(requested, progress) => result,
        };

        match launched {
            Ok(engine) => {
                let engine: Arc<dyn InferenceEngine> = Arc::new(LoggingEngine::new(engine));
                self.session.write().await.install(ActiveEngine {
                    model: requested.clone(),
                    engine,
                });
                loading.settle(SessionStatus::Ready {
                    model: requested.clone(),
                });
                tracing::info!(
                    model = %requested,
                    duration_ms = %start.elapsed().as_millis(),
                    "Model loaded"
                );
                progress.emit(LoadProgress::Ready {
                    model: requested.clone(),
                });
                Ok(())
            }
            Err(source) => {
                // The previous engine was already taken out, so the session
                // is empty here.
                tracing::error!(
                    model = %requested,
                    error = %source.message,
                    kind = ?source.kind,
                    "Model load failed"
                );
                loading.settle(SessionStatus::Failed {
                    model: requested.clone(),
                    detail: source.message.clone(),
                });
                progress.emit(LoadProgress::Failed {
                    model: requested.clone(),
                    detail: source.message.clone(),
                });
                Err(ModelLoadError::new(requested.clone(), source))
            }
        }
    }

    /// Unload a replaced engine. The release is abandoned when `cancel` fires
    /// or the load timeout passes; the handle is dropped either way.
    async fn release(&self, previous: &ActiveEngine, cancel: &CancellationToken) {
        let unload = async {
            match self.config.load_timeout {
                Some(limit) => tokio::time::timeout(limit, previous.engine.unload())
                    .await
                    .is_ok(),
                None => {
                    // Failures are logged by the engine wrapper.
                    let _ = previous.engine.unload().await;
                    true
                }
            }
        };

        let finished = tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            finished = unload => finished,
        };
        if !finished {
            tracing::warn!(model = %previous.model, "Gave up waiting for previous model to unload");
        }
    }

    /// Run the launcher, forwarding its reports and applying the load timeout
    async fn launch(
        &self,
        requested: &ModelKey,
        progress: &dyn ProgressSink,
    ) -> Result<Arc<dyn InferenceEngine>, EngineError> {
        let forward = |report: &str| progress.emit(LoadProgress::Engine(report.to_string()));
        let launch = self.launcher.launch(requested, &forward);

        match self.config.load_timeout {
            Some(limit) => tokio::time::timeout(limit, launch)
                .await
                .unwrap_or_else(|_| {
                    Err(EngineError::timeout(format!(
                        "Loading {requested} did not finish within {}s",
                        limit.as_secs_f32()
                    )))
                }),
            None => launch.await,
        }
    }

    /// Produce the persona's reply to `history`.
    ///
    /// Always yields displayable text: missing models and engine faults come
    /// back as sentinel messages rather than errors.
    pub async fn respond(&self, history: &[ConversationTurn], persona: &PersonaConfig) -> String {
        match self.try_respond(history, persona).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Responding with error text");
                e.to_string()
            }
        }
    }

    /// Typed form of [`Self::respond`]
    ///
    /// # Errors
    ///
    /// [`RespondError::NotLoaded`] without an active model, and
    /// [`RespondError::Generation`] when the engine fails.
    pub async fn try_respond(
        &self,
        history: &[ConversationTurn],
        persona: &PersonaConfig,
    ) -> Result<String, RespondError> {
        let engine = self
            .session
            .read()
            .await
            .engine()
            .ok_or(RespondError::NotLoaded)?;

        let messages = assemble_messages(persona, history);
        let completion = engine
            .complete(&messages, &self.config.sampling)
            .await
            .map_err(RespondError::Generation)?;

        Ok(completion
            .first_text()
            .unwrap_or(EMPTY_REPLY_PLACEHOLDER)
            .to_string())
    }
}
