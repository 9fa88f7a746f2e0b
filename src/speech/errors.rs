//! Capture error taxonomy and engine error classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw error codes reported by a continuous recognition engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineErrorCode {
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    ServiceNotAllowed,
    Other(String),
}

impl EngineErrorCode {
    /// Parse the engine's string code (`"no-speech"`, `"not-allowed"`, ...)
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" => Self::NotAllowed,
            "service-not-allowed" => Self::ServiceNotAllowed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_code(&self) -> &str {
        match self {
            Self::NoSpeech => "no-speech",
            Self::Aborted => "aborted",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::NotAllowed => "not-allowed",
            Self::ServiceNotAllowed => "service-not-allowed",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// Errors surfaced by the capture layer. Never returned to callers as `Err`;
/// they land in the single observable error slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureError {
    /// Speech recognition is not available in this environment
    UnsupportedCapability,
    /// Microphone or recognition service permission denied
    PermissionDenied,
    /// Audio capture device failed
    HardwareFailure,
    /// Engine heard nothing; capture continues
    NoSpeechDetected,
    /// Network failure, retried up to `max` times
    NetworkTransient { attempt: u32, max: u32 },
    /// Abort caused by our own stop request
    OperatorAbort,
    /// Anything the engine reports that we do not recognise
    UnknownEngineError(String),
}

/// How the lifecycle controller reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Terminal until the operator restarts manually
    Fatal,
    /// Retry after a delay while attempts remain
    Retryable,
    /// Surface in the error slot but keep the session running
    Reported,
    /// Drop without touching the error slot
    Silent,
}

impl CaptureError {
    /// Classify a raw engine code. `operator_stopping` distinguishes our own
    /// aborts from the engine aborting on its own.
    pub fn classify(code: &EngineErrorCode, operator_stopping: bool, attempt: u32, max: u32) -> Self {
        match code {
            EngineErrorCode::NoSpeech => Self::NoSpeechDetected,
            EngineErrorCode::Aborted if operator_stopping => Self::OperatorAbort,
            EngineErrorCode::Aborted => Self::UnknownEngineError("aborted".to_string()),
            EngineErrorCode::AudioCapture => Self::HardwareFailure,
            EngineErrorCode::NotAllowed | EngineErrorCode::ServiceNotAllowed => Self::PermissionDenied,
            EngineErrorCode::Network => Self::NetworkTransient { attempt, max },
            EngineErrorCode::Other(other) => Self::UnknownEngineError(other.clone()),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnsupportedCapability | Self::PermissionDenied | Self::HardwareFailure => {
                ErrorSeverity::Fatal
            }
            Self::NetworkTransient { attempt, max } => {
                if attempt < max {
                    ErrorSeverity::Retryable
                } else {
                    ErrorSeverity::Fatal
                }
            }
            Self::NoSpeechDetected | Self::OperatorAbort => ErrorSeverity::Silent,
            Self::UnknownEngineError(_) => ErrorSeverity::Reported,
        }
    }

    /// Message placed in the observable error slot
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedCapability => {
                "Speech recognition is not supported in this environment.".to_string()
            }
            Self::PermissionDenied => {
                "Microphone access was denied. Allow microphone access and press start again.".to_string()
            }
            Self::HardwareFailure => {
                "No microphone could be opened. Check your audio device and press start again.".to_string()
            }
            Self::NoSpeechDetected => "No speech detected.".to_string(),
            Self::NetworkTransient { attempt, max } if attempt < max => {
                format!("Network error. Retrying ({}/{})...", attempt, max)
            }
            Self::NetworkTransient { max, .. } => format!(
                "Network error persisted after {} attempts. Check your connection and press start again.",
                max
            ),
            Self::OperatorAbort => "Listening stopped.".to_string(),
            Self::UnknownEngineError(code) => format!("Speech recognition error: {}", code),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCapability => write!(f, "Unsupported capability"),
            Self::PermissionDenied => write!(f, "Permission denied"),
            Self::HardwareFailure => write!(f, "Hardware failure"),
            Self::NoSpeechDetected => write!(f, "No speech detected"),
            Self::NetworkTransient { attempt, max } => {
                write!(f, "Network error (attempt {}/{})", attempt, max)
            }
            Self::OperatorAbort => write!(f, "Aborted by operator"),
            Self::UnknownEngineError(code) => write!(f, "Unknown engine error: {}", code),
        }
    }
}

impl std::error::Error for CaptureError {}
