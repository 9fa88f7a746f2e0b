//! Serialized live sessions in the key-value table

use anyhow::{Context, Result};
use log::warn;
use std::sync::Arc;

use crate::database::{DatabaseManager, LiveSession, LIVE_SESSION_PREFIX};

#[derive(Clone)]
pub struct LiveSessionStore {
    db: Arc<DatabaseManager>,
}

impl LiveSessionStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Overwrite the stored copy of `session`
    pub fn publish(&self, session: &LiveSession) -> Result<()> {
        let raw = serde_json::to_string(session)
            .context("Failed to serialize live session")?;
        self.db.kv_put(&session.storage_key(), &raw)
    }

    pub fn load(&self, id: &str) -> Result<Option<LiveSession>> {
        match self.db.kv_get(&LiveSession::key_for(id))? {
            Some(raw) => {
                let session = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt live session {}", id))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// All sessions, newest first. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<LiveSession>> {
        let mut sessions = Vec::new();
        for key in self.db.kv_keys_with_prefix(LIVE_SESSION_PREFIX)? {
            let id = &key[LIVE_SESSION_PREFIX.len()..];
            match self.load(id) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!("Skipping live session {}: {:#}", id, e),
            }
        }
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    pub fn list_active(&self) -> Result<Vec<LiveSession>> {
        Ok(self.list()?.into_iter().filter(|s| s.is_active).collect())
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        self.db.kv_delete(&LiveSession::key_for(id))
    }
}
