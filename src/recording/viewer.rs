//! Viewer side of a live recording: periodic re-read of the host's key

use log::{debug, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::store::LiveSessionStore;
use crate::database::LiveSession;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct LiveSessionViewer {
    latest: watch::Receiver<Option<LiveSession>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LiveSessionViewer {
    /// Start polling session `id`. Polling ends on `stop`, or once the
    /// session has been observed as finished.
    pub fn spawn(store: LiveSessionStore, id: impl Into<String>, poll_interval: Duration) -> Self {
        let (tx, latest) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_session(store, id.into(), poll_interval, tx, cancel.clone()));
        Self { latest, cancel, task }
    }

    /// Last session state read, None until the key has been seen
    pub fn latest(&self) -> Option<LiveSession> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LiveSession>> {
        self.latest.clone()
    }

    pub fn is_polling(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Live session viewer task failed: {}", e);
        }
    }
}

async fn poll_session(
    store: LiveSessionStore,
    id: String,
    poll_interval: Duration,
    tx: watch::Sender<Option<LiveSession>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let session = match store.load(&id) {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to read live session {}: {:#}", id, e);
                continue;
            }
        };

        let finished = session.as_ref().map(|s| !s.is_active).unwrap_or(false);
        tx.send_if_modified(|current| {
            if *current == session {
                return false;
            }
            *current = session;
            true
        });

        if finished {
            debug!("Live session {} finished; viewer stops polling", id);
            break;
        }
    }
}
