//! Speech capability boundary
//!
//! A continuous, interim-capable speech-to-text engine. Implementations push
//! their native callbacks through an [`EventSink`]; every event is tagged with
//! the generation of the session that created the engine so late callbacks
//! from a torn-down instance can be recognised as stale.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use super::errors::EngineErrorCode;
use super::types::ResultBatch;
use crate::config::CaptureStrategy;

/// Native engine callbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Start,
    Result(ResultBatch),
    Error(EngineErrorCode),
    End,
}

/// An engine event stamped with the session generation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Where an engine delivers its callbacks
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the receiving side is gone
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Engine configuration derived from the capture strategy
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub language: String,
    pub max_alternatives: u32,
}

impl From<&CaptureStrategy> for EngineConfig {
    fn from(strategy: &CaptureStrategy) -> Self {
        Self {
            continuous: true,
            interim_results: strategy.interim_results_enabled,
            language: strategy.language.clone(),
            max_alternatives: 3,
        }
    }
}

/// Failure to create or start an engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub code: EngineErrorCode,
    pub message: String,
}

impl EngineFailure {
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for EngineFailure {}

/// One live engine instance
pub trait RecognitionEngine: Send {
    /// Begin listening
    fn start(&mut self) -> Result<(), EngineFailure>;

    /// Graceful halt; pending audio may still produce results. Must tolerate
    /// being called on an already stopped engine.
    fn stop(&mut self);

    /// Immediate halt, discarding pending audio. Same tolerance as `stop`.
    fn abort(&mut self);
}

/// Feature detection plus instance construction
pub trait EngineFactory: Send + Sync {
    fn is_supported(&self) -> bool;

    fn create(
        &self,
        config: &EngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn RecognitionEngine>, EngineFailure>;
}
