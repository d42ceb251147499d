//! Fake engines for testing
//!
//! These fakes record launches, unloads and requests so session behavior can
//! be checked without a real runtime.

use super::{LoadProgress, ProgressSink};
use crate::engine::{
    ChatMessage, Completion, EngineError, EngineLauncher, EngineReport, InferenceEngine, ModelKey,
    SamplingParams,
};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Reply used when nothing was queued
pub const DEFAULT_REPLY: &str = "嗯嗯～";

type ReplyQueue = Arc<Mutex<VecDeque<Result<Completion, EngineError>>>>;

// ============================================================================
// Fake Launcher
// ============================================================================

/// Launcher that creates [`FakeEngine`]s and records what it did
pub struct FakeLauncher {
    failing: Mutex<HashSet<String>>,
    reports: Vec<String>,
    delay: Mutex<Option<Duration>>,
    failing_unload: bool,
    stuck_unload: bool,
    replies: ReplyQueue,
    launched: Mutex<Vec<ModelKey>>,
    engines: Mutex<Vec<Arc<FakeEngine>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Arc<Notify>,
}

#[allow(dead_code)]
impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            reports: Vec::new(),
            delay: Mutex::new(None),
            failing_unload: false,
            stuck_unload: false,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            launched: Mutex::new(Vec::new()),
            engines: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: Arc::new(Notify::new()),
        }
    }

    /// Fail launches of `id`
    pub fn with_failing_key(self, id: &str) -> Self {
        self.failing.lock().unwrap().insert(id.to_string());
        self
    }

    /// Emit these engine reports on every launch
    pub fn with_reports(mut self, reports: Vec<&str>) -> Self {
        self.reports = reports.into_iter().map(str::to_string).collect();
        self
    }

    /// Sleep this long inside every launch
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(Some(delay));
        self
    }

    /// Engines report failure from `unload`
    pub fn with_failing_unload(mut self) -> Self {
        self.failing_unload = true;
        self
    }

    /// Engines never return from `unload`
    pub fn with_stuck_unload(mut self) -> Self {
        self.stuck_unload = true;
        self
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Queue a completion result for the next request to any engine
    pub fn queue_reply(&self, reply: Result<Completion, EngineError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Notified each time a launch begins
    pub fn launch_started(&self) -> Arc<Notify> {
        self.started.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    pub fn last_launched(&self) -> Option<ModelKey> {
        self.launched.lock().unwrap().last().cloned()
    }

    /// The `index`-th successfully created engine
    pub fn engine(&self, index: usize) -> Arc<FakeEngine> {
        self.engines.lock().unwrap()[index].clone()
    }

    /// Engines created and not yet unloaded
    pub fn live_engines(&self) -> usize {
        self.engines
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.is_unloaded())
            .count()
    }

    pub fn max_concurrent_launches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even when the launch future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(
        &self,
        model: &ModelKey,
        report: EngineReport<'_>,
    ) -> Result<Arc<dyn InferenceEngine>, EngineError> {
        self.launched.lock().unwrap().push(model.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);
        self.started.notify_one();

        for line in &self.reports {
            report(line.as_str());
        }

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(model.as_str()) {
            return Err(EngineError::not_found(format!(
                "model {model} could not be loaded"
            )));
        }

        let engine = Arc::new(FakeEngine {
            model: model.clone(),
            replies: self.replies.clone(),
            failing_unload: self.failing_unload,
            stuck_unload: self.stuck_unload,
            unloaded: AtomicBool::new(false),
            unload_attempts: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });
        self.engines.lock().unwrap().push(engine.clone());
        Ok(engine)
    }
}

// ============================================================================
// Fake Engine
// ============================================================================

/// Engine that answers from the launcher's reply queue
pub struct FakeEngine {
    model: ModelKey,
    replies: ReplyQueue,
    failing_unload: bool,
    stuck_unload: bool,
    unloaded: AtomicBool,
    unload_attempts: AtomicUsize,
    requests: Mutex<Vec<(Vec<ChatMessage>, SamplingParams)>>,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::SeqCst)
    }

    pub fn unload_attempts(&self) -> usize {
        self.unload_attempts.load(Ordering::SeqCst)
    }

    pub fn complete_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn recorded_requests(&self) -> Vec<(Vec<ChatMessage>, SamplingParams)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Completion, EngineError> {
        assert!(!self.is_unloaded(), "completion on unloaded engine {}", self.model);
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), *params));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Completion::from_text(DEFAULT_REPLY)))
    }

    async fn unload(&self) -> Result<(), EngineError> {
        self.unload_attempts.fetch_add(1, Ordering::SeqCst);
        if self.stuck_unload {
            std::future::pending::<()>().await;
        }
        // Released even when reporting failure; the handle is never reused.
        self.unloaded.store(true, Ordering::SeqCst);
        if self.failing_unload {
            return Err(EngineError::unknown("device lost during unload"));
        }
        Ok(())
    }

    fn model_key(&self) -> &ModelKey {
        &self.model
    }
}

// ============================================================================
// Recording progress sink
// ============================================================================

/// Progress sink that keeps every notification
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<LoadProgress>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<LoadProgress> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, progress: LoadProgress) {
        self.events.lock().unwrap().push(progress);
    }
}
