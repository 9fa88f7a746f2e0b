//! Host side of a live recording
//!
//! Follows a `SpeechCapture` and republishes its committed entries, labelled
//! with the host's speaker name, after every transcript change.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::store::LiveSessionStore;
use crate::database::LiveSession;
use crate::speech::{CaptureSnapshot, SpeechCapture, TranscriptEntry};

pub struct LiveSessionHost {
    session_id: String,
    store: LiveSessionStore,
    speaker: String,
    snapshots: watch::Receiver<CaptureSnapshot>,
    cancel: CancellationToken,
    task: JoinHandle<LiveSession>,
}

/// Final entries of `snapshot`, each labelled with `speaker` unless already labelled
fn labelled_finals(snapshot: &CaptureSnapshot, speaker: &str) -> Vec<TranscriptEntry> {
    snapshot
        .finals()
        .map(|e| match e.speaker {
            Some(_) => e.clone(),
            None => e.clone().with_speaker(speaker),
        })
        .collect()
}

/// Returns true when the stored copy had to be rewritten
fn sync_session(
    session: &mut LiveSession,
    snapshot: &CaptureSnapshot,
    speaker: &str,
    store: &LiveSessionStore,
) -> bool {
    let transcript = labelled_finals(snapshot, speaker);
    if transcript == session.transcript {
        return false;
    }
    session.transcript = transcript;
    session.updated_at = Utc::now();
    if let Err(e) = store.publish(session) {
        warn!("Failed to publish live session {}: {:#}", session.id, e);
    }
    true
}

impl LiveSessionHost {
    /// Create the session, publish it and start following `capture`
    pub fn start(
        store: LiveSessionStore,
        capture: &SpeechCapture,
        title: impl Into<String>,
        host: Option<String>,
        speaker: impl Into<String>,
    ) -> Result<Self> {
        let speaker = speaker.into();
        let mut snapshots = capture.subscribe();

        let mut session = LiveSession::new(title, host);
        session.transcript = labelled_finals(&snapshots.borrow_and_update(), &speaker);
        store.publish(&session).context("Failed to publish new live session")?;
        info!("Live session {} started ({})", session.id, session.title);

        let session_id = session.id.clone();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_publisher(
            session,
            snapshots.clone(),
            store.clone(),
            speaker.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            session_id,
            store,
            speaker,
            snapshots,
            cancel,
            task,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop following the capture, then mark the session inactive
    pub async fn finish(self) -> Result<LiveSession> {
        self.cancel.cancel();
        let mut session = self.task.await.context("Live session publisher panicked")?;

        sync_session(&mut session, &self.snapshots.borrow(), &self.speaker, &self.store);
        let now = Utc::now();
        session.is_active = false;
        session.ended_at = Some(now);
        session.updated_at = now;
        self.store.publish(&session).context("Failed to publish finished live session")?;

        info!(
            "Live session {} finished with {} entries",
            session.id,
            session.transcript.len()
        );
        Ok(session)
    }
}

async fn run_publisher(
    mut session: LiveSession,
    mut snapshots: watch::Receiver<CaptureSnapshot>,
    store: LiveSessionStore,
    speaker: String,
    cancel: CancellationToken,
) -> LiveSession {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    // capture shut down
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                sync_session(&mut session, &snapshot, &speaker, &store);
            }
        }
    }
    session
}
