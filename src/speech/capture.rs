//! Public speech capture handle
//!
//! `SpeechCapture` runs the lifecycle controller on a single tokio task. Caller
//! commands, engine callbacks and timer expiries are funnelled into that task
//! and applied one at a time, so the transcript has exactly one writer. After
//! every message a [`CaptureSnapshot`] is published on a watch channel.
//!
//! Commands are acknowledged only after their effects are published: once
//! `start_listening().await` returns, `is_listening()` already reflects it.

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::controller::{CaptureState, LifecycleController, TimerKind, TimerRequest};
use super::engine::{EngineFactory, SessionEvent};
use super::types::TranscriptEntry;
use crate::config::CaptureStrategy;

/// Observable state of a capture session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    pub is_listening: bool,
    pub is_supported: bool,
    pub transcript: Vec<TranscriptEntry>,
    pub error: Option<String>,
}

impl CaptureSnapshot {
    fn from_controller(ctrl: &LifecycleController) -> Self {
        Self {
            state: ctrl.state(),
            is_listening: ctrl.is_listening(),
            is_supported: ctrl.is_supported(),
            transcript: ctrl.store().entries().to_vec(),
            error: ctrl.error_message(),
        }
    }

    pub fn latest_final(&self) -> Option<&TranscriptEntry> {
        self.transcript.iter().rev().find(|e| e.is_final())
    }

    pub fn finals(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.transcript.iter().filter(|e| e.is_final())
    }
}

enum Command {
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Clear(oneshot::Sender<()>),
    Manual(String, oneshot::Sender<bool>),
    Refresh(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

enum Reply {
    Unit(oneshot::Sender<()>),
    Bool(oneshot::Sender<bool>, bool),
}

impl Reply {
    fn send(self) {
        match self {
            Reply::Unit(tx) => {
                let _ = tx.send(());
            }
            Reply::Bool(tx, value) => {
                let _ = tx.send(value);
            }
        }
    }
}

pub struct SpeechCapture {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<CaptureSnapshot>,
    task: JoinHandle<()>,
}

impl SpeechCapture {
    /// Spawn the capture task on the current tokio runtime
    pub fn spawn(factory: Arc<dyn EngineFactory>, strategy: CaptureStrategy) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let ctrl = LifecycleController::new(factory, strategy, events_tx);
        let (snapshot_tx, snapshot_rx) = watch::channel(CaptureSnapshot::from_controller(&ctrl));

        let task = tokio::spawn(run_capture_loop(ctrl, commands_rx, events_rx, snapshot_tx));

        Self {
            commands: commands_tx,
            snapshot: snapshot_rx,
            task,
        }
    }

    pub async fn start_listening(&self) {
        self.request(Command::Start).await;
    }

    /// Operator stop; a no-op when not listening
    pub async fn stop_listening(&self) {
        self.request(Command::Stop).await;
    }

    /// Empty the transcript and reset duplicate memory without stopping capture
    pub async fn clear_transcript(&self) {
        self.request(Command::Clear).await;
    }

    /// Append typed text as a final entry; false if empty or a duplicate
    pub async fn add_manual_entry(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.request(|tx| Command::Manual(text, tx)).await.unwrap_or(false)
    }

    /// Round-trip through the capture task so every engine callback queued
    /// before this call is applied, then return the resulting snapshot
    pub async fn refresh(&self) -> CaptureSnapshot {
        self.request(Command::Refresh).await;
        self.snapshot()
    }

    pub fn is_listening(&self) -> bool {
        self.snapshot.borrow().is_listening
    }

    pub fn is_supported(&self) -> bool {
        self.snapshot.borrow().is_supported
    }

    pub fn state(&self) -> CaptureState {
        self.snapshot.borrow().state
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.snapshot.borrow().transcript.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.snapshot.borrow().error.clone()
    }

    pub fn latest_final_text(&self) -> Option<String> {
        self.snapshot.borrow().latest_final().map(|e| e.text.clone())
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Change notifications; each published snapshot marks the receiver changed
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshot.clone()
    }

    /// Stop listening and wait for the capture task to finish
    pub async fn shutdown(self) {
        self.request(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!("Capture task ended abnormally: {}", e);
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(make(tx)).is_err() {
            warn!("Capture task is no longer running");
            return None;
        }
        rx.await.ok()
    }
}

async fn run_capture_loop(
    mut ctrl: LifecycleController,
    mut commands_rx: mpsc::UnboundedReceiver<Command>,
    mut events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    snapshot_tx: watch::Sender<CaptureSnapshot>,
) {
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<(TimerKind, u64)>();
    info!("Speech capture task started");

    loop {
        let mut reply = None;
        let mut shutting_down = false;

        // Engine callbacks and timers queued before a command are applied first
        tokio::select! {
            biased;

            Some(event) = events_rx.recv() => {
                ctrl.handle_event(event, tokio::time::Instant::now().into_std(), Utc::now());
            }
            Some((kind, token)) = timer_rx.recv() => {
                ctrl.fire_timer(kind, token);
            }
            command = commands_rx.recv() => {
                let Some(command) = command else {
                    debug!("All capture handles dropped");
                    ctrl.stop();
                    break;
                };
                match command {
                    Command::Start(tx) => {
                        ctrl.start();
                        reply = Some(Reply::Unit(tx));
                    }
                    Command::Stop(tx) => {
                        ctrl.stop();
                        reply = Some(Reply::Unit(tx));
                    }
                    Command::Clear(tx) => {
                        ctrl.clear_transcript();
                        reply = Some(Reply::Unit(tx));
                    }
                    Command::Manual(text, tx) => {
                        let added = ctrl.add_manual_entry(&text);
                        reply = Some(Reply::Bool(tx, added));
                    }
                    Command::Refresh(tx) => {
                        reply = Some(Reply::Unit(tx));
                    }
                    Command::Shutdown(tx) => {
                        ctrl.stop();
                        reply = Some(Reply::Unit(tx));
                        shutting_down = true;
                    }
                }
            }
        }

        for timer in ctrl.take_timers() {
            schedule_timer(timer, timer_tx.clone());
        }

        let next = CaptureSnapshot::from_controller(&ctrl);
        snapshot_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });

        if let Some(reply) = reply {
            reply.send();
        }
        if shutting_down {
            break;
        }
    }

    info!("Speech capture task finished");
}

fn schedule_timer(timer: TimerRequest, tx: mpsc::UnboundedSender<(TimerKind, u64)>) {
    tokio::spawn(async move {
        tokio::time::sleep(timer.delay).await;
        let _ = tx.send((timer.kind, timer.token));
    });
}
