// speech/types.rs
//
// Recognition event payloads and transcript entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One candidate transcription offered by the engine for a result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognitionAlternative {
    pub transcript: String,
    /// Engine-reported score in [0,1]; engines that do not score report None
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl RecognitionAlternative {
    pub fn new(transcript: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
        }
    }
}

/// A single recognition result, either provisional (interim) or final
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub is_final: bool,
    pub alternatives: Vec<RecognitionAlternative>,
}

impl RecognitionResult {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            is_final: false,
            alternatives: vec![RecognitionAlternative::new(text, None)],
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            is_final: true,
            alternatives: vec![RecognitionAlternative::new(text, None)],
        }
    }

    /// Pick the best alternative: highest confidence, then longer text,
    /// then the later (most recently produced) alternative.
    pub fn best_alternative(&self) -> Option<&RecognitionAlternative> {
        self.alternatives.iter().reduce(|best, candidate| {
            let best_conf = best.confidence.unwrap_or(0.0);
            let cand_conf = candidate.confidence.unwrap_or(0.0);
            if cand_conf > best_conf {
                return candidate;
            }
            if cand_conf < best_conf {
                return best;
            }
            let best_len = best.transcript.trim().chars().count();
            let cand_len = candidate.transcript.trim().chars().count();
            if cand_len >= best_len {
                candidate
            } else {
                best
            }
        })
    }
}

/// A raw result event: the engine's growing, index-addressed result list.
/// `result_index` is the lowest index that changed since the previous event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultBatch {
    pub result_index: usize,
    pub results: Vec<RecognitionResult>,
}

impl ResultBatch {
    pub fn new(results: Vec<RecognitionResult>) -> Self {
        Self {
            result_index: 0,
            results,
        }
    }

    pub fn with_index(result_index: usize, results: Vec<RecognitionResult>) -> Self {
        Self {
            result_index,
            results,
        }
    }

    pub fn has_final(&self) -> bool {
        self.changed().any(|r| r.is_final)
    }

    /// Results at or after `result_index`
    pub fn changed(&self) -> impl Iterator<Item = &RecognitionResult> {
        self.results.iter().skip(self.result_index)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Interim,
    Final,
}

/// A stable transcript entry produced by the reconciler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub kind: EntryKind,
}

impl TranscriptEntry {
    pub fn new_final(text: impl Into<String>, confidence: Option<f32>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: format!("final_{}", Uuid::new_v4()),
            text: text.into(),
            timestamp,
            confidence,
            speaker: None,
            kind: EntryKind::Final,
        }
    }

    pub fn new_interim(text: impl Into<String>, confidence: Option<f32>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: format!("interim_{}", Uuid::new_v4()),
            text: text.into(),
            timestamp,
            confidence,
            speaker: None,
            kind: EntryKind::Interim,
        }
    }

    /// Manually typed text, wrapped as a final entry with full confidence
    pub fn manual(text: impl Into<String>) -> Self {
        Self::new_final(text, Some(1.0), Utc::now())
    }

    pub fn is_interim(&self) -> bool {
        self.kind == EntryKind::Interim
    }

    pub fn is_final(&self) -> bool {
        self.kind == EntryKind::Final
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_alternative_prefers_confidence() {
        let result = RecognitionResult {
            is_final: true,
            alternatives: vec![
                RecognitionAlternative::new("tell me about yourself", Some(0.6)),
                RecognitionAlternative::new("tell me about your shelf", Some(0.9)),
            ],
        };
        assert_eq!(result.best_alternative().unwrap().transcript, "tell me about your shelf");
    }

    #[test]
    fn test_best_alternative_tie_breaks() {
        let longer = RecognitionResult {
            is_final: true,
            alternatives: vec![
                RecognitionAlternative::new("what is your name please", Some(0.8)),
                RecognitionAlternative::new("what is your name", Some(0.8)),
            ],
        };
        assert_eq!(longer.best_alternative().unwrap().transcript, "what is your name please");

        let later = RecognitionResult {
            is_final: true,
            alternatives: vec![
                RecognitionAlternative::new("first", None),
                RecognitionAlternative::new("other", None),
            ],
        };
        assert_eq!(later.best_alternative().unwrap().transcript, "other");
    }

    #[test]
    fn test_entry_ids_distinguish_kind() {
        let now = Utc::now();
        let fin = TranscriptEntry::new_final("hello there", None, now);
        let interim = TranscriptEntry::new_interim("hello", Some(0.75), now);
        assert!(fin.id.starts_with("final_"));
        assert!(interim.id.starts_with("interim_"));
        assert!(fin.is_final());
        assert!(interim.is_interim());
    }

    #[test]
    fn test_batch_changed_skips_stable_prefix() {
        let batch = ResultBatch::with_index(
            1,
            vec![
                RecognitionResult::final_text("already handled"),
                RecognitionResult::interim("new words"),
            ],
        );
        assert!(!batch.has_final());
        assert_eq!(batch.changed().count(), 1);
    }
}
