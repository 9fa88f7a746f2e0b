//! Scripted speech engine for environments without a native recognizer.
//!
//! Records every call made against it and lets the caller (tests, demos)
//! inject engine callbacks for the most recently created instance. An optional
//! script is replayed on a timer each time an instance starts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::engine::{EngineConfig, EngineEvent, EngineFactory, EngineFailure, EventSink, RecognitionEngine};
use super::errors::EngineErrorCode;

/// Engine instances whose sinks stay reachable through `emit_from`
const SINK_HISTORY: usize = 8;
/// Recorded calls and configs kept for inspection
const CALL_HISTORY: usize = 256;

fn push_bounded<T>(list: &mut VecDeque<T>, item: T, limit: usize) {
    list.push_back(item);
    while list.len() > limit {
        list.pop_front();
    }
}

/// A call observed by the scripted engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create(u64),
    Start(u64),
    Stop(u64),
    Abort(u64),
}

#[derive(Debug)]
struct Shared {
    supported: bool,
    sinks: VecDeque<EventSink>,
    created: usize,
    calls: VecDeque<EngineCall>,
    configs: VecDeque<EngineConfig>,
    fail_next_start: Option<EngineFailure>,
    script: Vec<(Duration, EngineEvent)>,
}

#[derive(Debug, Clone)]
pub struct ScriptedEngineFactory {
    shared: Arc<Mutex<Shared>>,
}

impl Default for ScriptedEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngineFactory {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                supported: true,
                sinks: VecDeque::new(),
                created: 0,
                calls: VecDeque::new(),
                configs: VecDeque::new(),
                fail_next_start: None,
                script: Vec::new(),
            })),
        }
    }

    /// A factory whose feature detection reports no capability
    pub fn unsupported() -> Self {
        let factory = Self::new();
        factory.lock().supported = false;
        factory
    }

    /// Events replayed (each after its delay, relative to the previous one)
    /// whenever an instance starts
    pub fn with_script(self, script: Vec<(Duration, EngineEvent)>) -> Self {
        self.lock().script = script;
        self
    }

    /// Make the next `start()` call fail with `code`
    pub fn fail_next_start(&self, code: EngineErrorCode) {
        self.lock().fail_next_start = Some(EngineFailure::new(code, "scripted start failure"));
    }

    /// Most recent calls, oldest first
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Instances created over the factory's lifetime
    pub fn created_count(&self) -> usize {
        self.lock().created
    }

    pub fn last_config(&self) -> Option<EngineConfig> {
        self.lock().configs.back().cloned()
    }

    pub fn latest_generation(&self) -> Option<u64> {
        self.lock().sinks.back().map(EventSink::generation)
    }

    /// Deliver a callback from the most recently created instance
    pub fn emit(&self, event: EngineEvent) -> bool {
        let sink = self.lock().sinks.back().cloned();
        sink.map(|s| s.emit(event)).unwrap_or(false)
    }

    /// Deliver a callback from a specific (possibly torn-down) instance.
    /// Only the most recent instances are remembered.
    pub fn emit_from(&self, generation: u64, event: EngineEvent) -> bool {
        let sink = self
            .lock()
            .sinks
            .iter()
            .find(|s| s.generation() == generation)
            .cloned();
        sink.map(|s| s.emit(event)).unwrap_or(false)
    }

    fn record(&self, call: EngineCall) {
        push_bounded(&mut self.lock().calls, call, CALL_HISTORY);
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn is_supported(&self) -> bool {
        self.lock().supported
    }

    fn create(
        &self,
        config: &EngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn RecognitionEngine>, EngineFailure> {
        let generation = sink.generation();
        {
            let mut shared = self.lock();
            shared.created += 1;
            push_bounded(&mut shared.calls, EngineCall::Create(generation), CALL_HISTORY);
            push_bounded(&mut shared.configs, config.clone(), CALL_HISTORY);
            push_bounded(&mut shared.sinks, sink.clone(), SINK_HISTORY);
        }
        Ok(Box::new(ScriptedEngine {
            factory: self.clone(),
            sink,
            running: false,
        }))
    }
}

struct ScriptedEngine {
    factory: ScriptedEngineFactory,
    sink: EventSink,
    running: bool,
}

impl RecognitionEngine for ScriptedEngine {
    fn start(&mut self) -> Result<(), EngineFailure> {
        let generation = self.sink.generation();
        let (failure, script) = {
            let mut shared = self.factory.lock();
            push_bounded(&mut shared.calls, EngineCall::Start(generation), CALL_HISTORY);
            (shared.fail_next_start.take(), shared.script.clone())
        };
        if let Some(failure) = failure {
            return Err(failure);
        }
        self.running = true;

        if !script.is_empty() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let sink = self.sink.clone();
                handle.spawn(async move {
                    for (delay, event) in script {
                        tokio::time::sleep(delay).await;
                        if !sink.emit(event) {
                            break;
                        }
                    }
                });
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.factory.record(EngineCall::Stop(self.sink.generation()));
        if self.running {
            self.running = false;
            self.sink.emit(EngineEvent::End);
        }
    }

    fn abort(&mut self) {
        self.factory.record(EngineCall::Abort(self.sink.generation()));
        if self.running {
            self.running = false;
            self.sink.emit(EngineEvent::Error(EngineErrorCode::Aborted));
            self.sink.emit(EngineEvent::End);
        }
    }
}
