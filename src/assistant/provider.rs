//! Answer provider trait and types
//!
//! Defines the boundary to the generative-AI text service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

use super::context::MeetingContext;
use crate::speech::TranscriptEntry;

/// Classified failures of an assistance request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssistError {
    /// API key missing, malformed or rejected
    InvalidCredential,
    /// Billing quota used up
    QuotaExceeded,
    /// Too many requests in a short period
    RateLimited,
    /// The service refused to answer on safety grounds
    ContentFiltered,
    /// Superseded by a newer request of the same kind, or cancelled by the caller
    Cancelled,
    /// No final transcript entry and no manual text to send
    NoQuestion,
    /// The kind requires the premium tier
    PremiumRequired,
    Unknown(String),
}

impl fmt::Display for AssistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistError::InvalidCredential => write!(f, "invalid-credential"),
            AssistError::QuotaExceeded => write!(f, "quota-exceeded"),
            AssistError::RateLimited => write!(f, "rate-limited"),
            AssistError::ContentFiltered => write!(f, "content-filtered"),
            AssistError::Cancelled => write!(f, "cancelled"),
            AssistError::NoQuestion => write!(f, "no-question"),
            AssistError::PremiumRequired => write!(f, "premium-required"),
            AssistError::Unknown(msg) => write!(f, "unknown: {}", msg),
        }
    }
}

impl std::error::Error for AssistError {}

impl AssistError {
    /// Text suitable for a transient notification
    pub fn user_message(&self) -> String {
        match self {
            AssistError::InvalidCredential => {
                "The AI service rejected the API key. Check your key in settings.".to_string()
            }
            AssistError::QuotaExceeded => {
                "The AI service quota has been used up. Try again later.".to_string()
            }
            AssistError::RateLimited => {
                "Too many requests. Wait a moment and try again.".to_string()
            }
            AssistError::ContentFiltered => {
                "The AI service declined to answer this question.".to_string()
            }
            AssistError::Cancelled => "Request cancelled.".to_string(),
            AssistError::NoQuestion => {
                "No question captured yet. Speak or type a question first.".to_string()
            }
            AssistError::PremiumRequired => {
                "This feature is available on the premium plan.".to_string()
            }
            AssistError::Unknown(msg) => format!("The AI service failed: {}", msg),
        }
    }
}

/// What the user is asking the assistant to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistKind {
    Answer,
    CodeSample,
    Summary,
    Tips,
}

impl AssistKind {
    pub fn requires_premium(&self) -> bool {
        !matches!(self, AssistKind::Answer)
    }
}

impl fmt::Display for AssistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistKind::Answer => write!(f, "answer"),
            AssistKind::CodeSample => write!(f, "code sample"),
            AssistKind::Summary => write!(f, "summary"),
            AssistKind::Tips => write!(f, "tips"),
        }
    }
}

/// One request to the text-generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub kind: AssistKind,
    pub context: MeetingContext,
    /// The latest final entry, or typed text as a synthetic entry
    pub transcript: Vec<TranscriptEntry>,
}

impl AnswerRequest {
    /// The text being asked about: the most recent entry
    pub fn question(&self) -> Option<&str> {
        self.transcript.last().map(|e| e.text.as_str())
    }
}

/// Backend that turns a request into generated text
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Short identifier used in logs (e.g. "gemini")
    fn provider_name(&self) -> &'static str;

    /// Generate text. Implementations return `Cancelled` as soon as `cancel`
    /// fires.
    async fn generate(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<String, AssistError>;
}
