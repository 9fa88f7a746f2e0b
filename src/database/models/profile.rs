// Database models - Interview profiles
use serde::{Deserialize, Serialize};

use crate::assistant::MeetingContext;

/// A saved interview setup the user can reload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewProfile {
    pub id: String,
    pub name: String,
    pub context: MeetingContext,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating or replacing a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveInterviewProfile {
    pub name: String,
    pub context: MeetingContext,
}
