//! Recognition session wrapper
//!
//! Owns at most one engine instance. Every `open` tears the previous instance
//! down first and hands the new one a fresh generation number; callbacks
//! carrying any other generation are stale.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::engine::{EngineConfig, EngineFactory, EngineFailure, EventSink, RecognitionEngine, SessionEvent};

pub struct RecognitionSession {
    factory: Arc<dyn EngineFactory>,
    config: EngineConfig,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    engine: Option<Box<dyn RecognitionEngine>>,
    /// Generation of the live engine, None when nothing is running
    active_generation: Option<u64>,
    last_generation: u64,
    operator_stopped: bool,
}

impl RecognitionSession {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        config: EngineConfig,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            factory,
            config,
            events_tx,
            engine: None,
            active_generation: None,
            last_generation: 0,
            operator_stopped: false,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.factory.is_supported()
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active_generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active_generation == Some(generation)
    }

    pub fn operator_stopped(&self) -> bool {
        self.operator_stopped
    }

    /// Tear down any previous engine, then create and start a new one
    pub fn open(&mut self) -> Result<u64, EngineFailure> {
        self.teardown();
        self.operator_stopped = false;

        self.last_generation += 1;
        let generation = self.last_generation;
        let sink = EventSink::new(generation, self.events_tx.clone());

        let mut engine = self.factory.create(&self.config, sink)?;
        if let Err(failure) = engine.start() {
            warn!("Recognition engine {} failed to start: {}", generation, failure);
            engine.abort();
            return Err(failure);
        }

        info!("Recognition session {} started", generation);
        self.engine = Some(engine);
        self.active_generation = Some(generation);
        Ok(generation)
    }

    /// Operator-initiated stop. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        self.operator_stopped = true;
        match self.engine.take() {
            Some(mut engine) => {
                engine.stop();
                if let Some(generation) = self.active_generation.take() {
                    info!("Recognition session {} stopped by operator", generation);
                }
                true
            }
            None => {
                self.active_generation = None;
                false
            }
        }
    }

    /// The engine ended on its own; retire it without further calls
    pub fn mark_ended(&mut self) {
        if let Some(generation) = self.active_generation.take() {
            debug!("Recognition session {} ended", generation);
        }
        self.engine = None;
    }

    /// Abort and drop the current engine, if any. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.abort();
        }
        if let Some(generation) = self.active_generation.take() {
            debug!("Recognition session {} torn down", generation);
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
