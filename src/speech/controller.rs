//! Lifecycle/retry controller
//!
//! Keeps a capture session looking continuous although the engine keeps
//! ending on its own. All state changes go through this type; it never
//! sleeps. Delays are handed to the driver as [`TimerRequest`]s and come back
//! through [`LifecycleController::fire_timer`] carrying the token they were
//! issued with, so a cancelled timer that still fires is a no-op.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::engine::{EngineConfig, EngineEvent, EngineFactory, SessionEvent};
use super::errors::{CaptureError, EngineErrorCode, ErrorSeverity};
use super::reconciler::{ReconcileOutcome, ReconcilerConfig, ResultReconciler};
use super::session::RecognitionSession;
use super::text::normalize_utterance;
use super::transcript::TranscriptStore;
use super::types::TranscriptEntry;
use crate::config::CaptureStrategy;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CaptureState {
    #[default]
    Idle,
    Listening,
    Restarting,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Restart,
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub kind: TimerKind,
    pub token: u64,
    pub delay: Duration,
}

pub struct LifecycleController {
    strategy: CaptureStrategy,
    state: CaptureState,
    session: RecognitionSession,
    reconciler: ResultReconciler,
    store: TranscriptStore,
    error: Option<CaptureError>,
    network_attempts: u32,
    pending_restart: Option<u64>,
    deadline: Option<u64>,
    next_token: u64,
    timers: Vec<TimerRequest>,
}

impl LifecycleController {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        strategy: CaptureStrategy,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let session = RecognitionSession::new(factory, EngineConfig::from(&strategy), events_tx);
        let reconciler = ResultReconciler::new(ReconcilerConfig::from(&strategy));
        Self {
            strategy,
            state: CaptureState::Idle,
            session,
            reconciler,
            store: TranscriptStore::new(),
            error: None,
            network_attempts: 0,
            pending_restart: None,
            deadline: None,
            next_token: 0,
            timers: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == CaptureState::Listening
    }

    pub fn is_supported(&self) -> bool {
        self.session.is_supported()
    }

    pub fn error(&self) -> Option<&CaptureError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(CaptureError::user_message)
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    pub fn network_attempts(&self) -> u32 {
        self.network_attempts
    }

    pub fn has_pending_restart(&self) -> bool {
        self.pending_restart.is_some()
    }

    /// Timers requested since the last call
    pub fn take_timers(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.timers)
    }

    /// Operator start. Also the manual retry out of the `Error` state.
    pub fn start(&mut self) {
        if !self.session.is_supported() {
            warn!("Speech recognition capability is not available");
            self.session.teardown();
            self.pending_restart = None;
            self.deadline = None;
            self.error = Some(CaptureError::UnsupportedCapability);
            self.state = CaptureState::Error;
            return;
        }

        info!("Start listening requested (state: {:?})", self.state);
        self.pending_restart = None;
        self.deadline = None;
        self.network_attempts = 0;
        self.error = None;
        self.open_session();
    }

    /// Operator stop. Returns false when there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        self.pending_restart = None;
        match self.state {
            CaptureState::Idle | CaptureState::Error => {
                debug!("Stop requested while {:?}; nothing to do", self.state);
                false
            }
            CaptureState::Listening | CaptureState::Restarting => {
                // Intent is recorded inside the session before the engine is
                // asked to halt, and the generation is retired with it.
                self.session.stop();
                self.deadline = None;
                self.store.clear_interim();
                self.state = CaptureState::Idle;
                info!("Listening stopped");
                true
            }
        }
    }

    /// Empty the transcript and forget all duplicate memory. Capture continues.
    pub fn clear_transcript(&mut self) {
        self.store.clear();
        self.reconciler.reset();
        info!("Transcript cleared");
    }

    /// Append typed text as a final entry. Returns false for empty or
    /// duplicate text.
    pub fn add_manual_entry(&mut self, text: &str) -> bool {
        let text = normalize_utterance(text);
        if text.is_empty() {
            return false;
        }
        self.reconciler.commit_manual(TranscriptEntry::manual(text), &mut self.store)
    }

    /// Handle one engine callback. Returns true when observable state changed.
    pub fn handle_event(&mut self, event: SessionEvent, now: Instant, captured_at: DateTime<Utc>) -> bool {
        if !self.session.is_current(event.generation) {
            debug!(
                "Ignoring stale {:?} from session {}",
                event_name(&event.event),
                event.generation
            );
            return false;
        }

        match event.event {
            EngineEvent::Start => {
                let changed = self.state != CaptureState::Listening || self.error.is_some();
                self.state = CaptureState::Listening;
                self.error = None;
                self.arm_deadline();
                changed
            }
            EngineEvent::Result(batch) => {
                let outcome = self.reconciler.process(&batch, now, captured_at, &mut self.store);
                if let ReconcileOutcome::Committed(entry) = &outcome {
                    debug!("Committed transcript entry {}", entry.id);
                    self.network_attempts = 0;
                }
                outcome.changed_transcript()
            }
            EngineEvent::Error(code) => self.apply_error(code),
            EngineEvent::End => self.on_engine_end(),
        }
    }

    /// A timer issued through `take_timers` elapsed
    pub fn fire_timer(&mut self, kind: TimerKind, token: u64) -> bool {
        match kind {
            TimerKind::Restart => {
                if self.pending_restart != Some(token) {
                    debug!("Ignoring cancelled restart timer {}", token);
                    return false;
                }
                self.pending_restart = None;
                if self.state != CaptureState::Restarting {
                    return false;
                }
                info!("Re-arming recognition session");
                self.open_session();
                true
            }
            TimerKind::Deadline => {
                if self.deadline != Some(token) {
                    return false;
                }
                self.deadline = None;
                if self.state != CaptureState::Listening {
                    return false;
                }
                info!("Listening deadline reached, stopping session");
                self.stop()
            }
        }
    }

    fn open_session(&mut self) {
        self.reconciler.reset();
        match self.session.open() {
            Ok(_) => {
                self.state = CaptureState::Listening;
            }
            Err(failure) => {
                let code = failure.code;
                self.apply_error(code.clone());
                // No end event follows a failed start; unless a retry was
                // scheduled the session has nowhere to go but Error.
                if self.state != CaptureState::Error && self.pending_restart.is_none() {
                    self.fail(CaptureError::UnknownEngineError(code.as_code().to_string()));
                }
            }
        }
    }

    fn apply_error(&mut self, code: EngineErrorCode) -> bool {
        let attempt = if code == EngineErrorCode::Network {
            self.network_attempts + 1
        } else {
            self.network_attempts
        };
        let err = CaptureError::classify(
            &code,
            self.session.operator_stopped(),
            attempt,
            self.strategy.max_retries,
        );

        match err.severity() {
            ErrorSeverity::Silent => {
                debug!("Engine reported {} ({}); continuing", code, err);
                false
            }
            ErrorSeverity::Reported => {
                warn!("Engine error: {}", err);
                self.error = Some(err);
                true
            }
            ErrorSeverity::Retryable => {
                self.network_attempts = attempt;
                warn!("{}; retrying in {:?}", err, self.strategy.network_retry_delay());
                self.error = Some(err);
                self.state = CaptureState::Restarting;
                self.deadline = None;
                self.store.clear_interim();
                if self.pending_restart.is_none() {
                    self.schedule_restart(self.strategy.network_retry_delay());
                }
                true
            }
            ErrorSeverity::Fatal => {
                if code == EngineErrorCode::Network {
                    self.network_attempts = attempt;
                }
                self.fail(err);
                true
            }
        }
    }

    fn fail(&mut self, err: CaptureError) {
        error!("Capture failed: {}", err);
        self.session.teardown();
        self.pending_restart = None;
        self.deadline = None;
        self.store.clear_interim();
        self.error = Some(err);
        self.state = CaptureState::Error;
    }

    fn on_engine_end(&mut self) -> bool {
        self.session.mark_ended();
        self.deadline = None;
        let interim_dropped = self.store.clear_interim();

        match self.state {
            CaptureState::Listening => {
                info!("Engine ended on its own; restarting");
                self.state = CaptureState::Restarting;
                self.schedule_restart(self.strategy.auto_restart_delay());
                true
            }
            CaptureState::Restarting => {
                if self.pending_restart.is_none() {
                    self.schedule_restart(self.strategy.auto_restart_delay());
                }
                interim_dropped
            }
            CaptureState::Idle | CaptureState::Error => interim_dropped,
        }
    }

    fn schedule_restart(&mut self, delay: Duration) {
        let token = self.issue_token();
        self.pending_restart = Some(token);
        self.timers.push(TimerRequest {
            kind: TimerKind::Restart,
            token,
            delay,
        });
    }

    fn arm_deadline(&mut self) {
        match self.strategy.session_timeout() {
            Some(timeout) => {
                let token = self.issue_token();
                self.deadline = Some(token);
                self.timers.push(TimerRequest {
                    kind: TimerKind::Deadline,
                    token,
                    delay: timeout,
                });
            }
            None => self.deadline = None,
        }
    }

    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

fn event_name(event: &EngineEvent) -> &'static str {
    match event {
        EngineEvent::Start => "start",
        EngineEvent::Result(_) => "result",
        EngineEvent::Error(_) => "error",
        EngineEvent::End => "end",
    }
}
