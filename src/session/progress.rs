//! Load progress notifications and observable session status

use crate::engine::ModelKey;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

/// One notification emitted while a load settles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadProgress {
    /// Requested model is already active; nothing to do
    AlreadyReady { model: ModelKey },
    /// Releasing the previously active model
    Unloading { previous: ModelKey },
    /// Engine creation is starting
    Initializing { model: ModelKey },
    /// Report from the engine runtime, passed through unchanged
    Engine(String),
    /// Model loaded and active
    Ready { model: ModelKey },
    /// Engine creation failed; session is empty
    Failed { model: ModelKey, detail: String },
}

impl fmt::Display for LoadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyReady { model } => write!(f, "Model {model} is already ready"),
            Self::Unloading { previous } => write!(f, "Unloading previous model {previous}..."),
            Self::Initializing { model } => write!(
                f,
                "Initializing {model}... (the first load may need to download weights)"
            ),
            Self::Engine(report) => f.write_str(report),
            Self::Ready { model } => write!(f, "Model {model} loaded and ready"),
            Self::Failed { model, detail } => write!(
                f,
                "Error loading {model}: the hardware may be unsupported or out of memory ({detail})"
            ),
        }
    }
}

/// Receives load progress, in emission order
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: LoadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(LoadProgress) + Send + Sync,
{
    fn emit(&self, progress: LoadProgress) {
        self(progress);
    }
}

/// Sink that forwards progress into a bounded channel.
///
/// Emitting never waits on the receiver: updates that do not fit are
/// dropped, so a slow consumer cannot stall a load.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<LoadProgress>,
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, progress: LoadProgress) {
        // A closed channel only means nobody is watching anymore.
        if let Err(TrySendError::Full(dropped)) = self.tx.try_send(progress) {
            tracing::debug!(progress = %dropped, "Progress channel full, dropping update");
        }
    }
}

/// Create a progress sink paired with the stream of its notifications,
/// holding at most `capacity` undelivered updates (at least one).
#[must_use]
pub fn progress_channel(capacity: usize) -> (ChannelProgress, mpsc::Receiver<LoadProgress>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelProgress { tx }, rx)
}

/// Sink that drops everything
pub fn ignore_progress(_: LoadProgress) {}

/// Observable state of a session manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Empty,
    Loading {
        model: ModelKey,
    },
    Ready {
        model: ModelKey,
    },
    /// Last load failed; no engine is active
    Failed {
        model: ModelKey,
        detail: String,
    },
}

impl SessionStatus {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}
