// Database models - Live recording sessions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::speech::TranscriptEntry;

/// Key namespace in the kv store
pub const LIVE_SESSION_PREFIX: &str = "live_session:";

/// A shared recording session. Written only by its host, read by viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSession {
    pub id: String,
    pub title: String,
    pub host: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl LiveSession {
    pub fn new(title: impl Into<String>, host: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            host,
            transcript: Vec::new(),
            is_active: true,
            started_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    pub fn storage_key(&self) -> String {
        Self::key_for(&self.id)
    }

    pub fn key_for(id: &str) -> String {
        format!("{}{}", LIVE_SESSION_PREFIX, id)
    }
}
