// speech/reconciler.rs
//
// Turns raw, cumulative recognition batches into stable transcript entries.
// Engines replay their result buffers and resend finalized text, so every
// final is checked against the last commit, a rolling window of recent
// finals, and the transcript itself before it is appended.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::text::{dedup_key, join_fragments};
use super::transcript::TranscriptStore;
use super::types::{ResultBatch, TranscriptEntry};
use crate::config::CaptureStrategy;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerConfig {
    pub throttle: Duration,
    pub interim_results_enabled: bool,
    pub dedup_window: usize,
    pub min_final_chars: usize,
    pub interim_confidence: f32,
}

impl From<&CaptureStrategy> for ReconcilerConfig {
    fn from(strategy: &CaptureStrategy) -> Self {
        Self {
            throttle: strategy.throttle(),
            interim_results_enabled: strategy.interim_results_enabled,
            dedup_window: strategy.dedup_window,
            min_final_chars: strategy.min_final_chars,
            interim_confidence: strategy.interim_confidence,
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::from(&CaptureStrategy::default())
    }
}

/// What a batch did to the transcript
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Committed(TranscriptEntry),
    InterimUpdated(TranscriptEntry),
    /// A duplicate final arrived; the stale interim entry was dropped
    InterimCleared,
    /// Interim-only batch arrived inside the throttle interval
    Throttled,
    /// Nothing new in the batch
    Unchanged,
}

impl ReconcileOutcome {
    pub fn changed_transcript(&self) -> bool {
        matches!(
            self,
            Self::Committed(_) | Self::InterimUpdated(_) | Self::InterimCleared
        )
    }
}

#[derive(Debug)]
pub struct ResultReconciler {
    config: ReconcilerConfig,
    last_processed: Option<Instant>,
    last_committed: Option<String>,
    recent_finals: VecDeque<String>,
}

impl ResultReconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            last_processed: None,
            last_committed: None,
            recent_finals: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Forget throttle and duplicate memory
    pub fn reset(&mut self) {
        self.last_processed = None;
        self.last_committed = None;
        self.recent_finals.clear();
    }

    /// Last committed final text, lowercased
    pub fn last_committed(&self) -> Option<&str> {
        self.last_committed.as_deref()
    }

    pub fn process(
        &mut self,
        batch: &ResultBatch,
        now: Instant,
        captured_at: DateTime<Utc>,
        store: &mut TranscriptStore,
    ) -> ReconcileOutcome {
        let has_final = batch.has_final();
        if !has_final {
            if let Some(last) = self.last_processed {
                if now.saturating_duration_since(last) < self.config.throttle {
                    debug!("Interim batch throttled");
                    return ReconcileOutcome::Throttled;
                }
            }
        }
        self.last_processed = Some(now);

        let mut final_parts = Vec::new();
        let mut interim_parts = Vec::new();
        let mut confidences = Vec::new();
        for result in batch.changed() {
            let Some(best) = result.best_alternative() else {
                continue;
            };
            if result.is_final {
                // Replayed buffers resend finals that were already committed
                // one by one; only the unseen ones may join the new entry
                if self.is_known(&best.transcript, store) {
                    continue;
                }
                final_parts.push(best.transcript.as_str());
                if let Some(c) = best.confidence.filter(|c| *c > 0.0) {
                    confidences.push(c.min(1.0));
                }
            } else {
                interim_parts.push(best.transcript.as_str());
            }
        }
        let final_text = join_fragments(final_parts);
        let interim_text = join_fragments(interim_parts);

        if !final_text.is_empty() {
            if self.accepts_final(&final_text, store) {
                let confidence = if confidences.is_empty() {
                    1.0
                } else {
                    confidences.iter().sum::<f32>() / confidences.len() as f32
                };
                let entry = TranscriptEntry::new_final(final_text.clone(), Some(confidence), captured_at);
                if store.commit_final(entry.clone()) {
                    self.remember(&final_text);
                    return ReconcileOutcome::Committed(entry);
                }
            }
            debug!("Dropping duplicate or trivial final: '{}'", final_text);
        }

        if !interim_text.is_empty() && self.config.interim_results_enabled {
            let key = dedup_key(&interim_text);
            if self.last_committed.as_deref() != Some(key.as_str()) {
                let entry = TranscriptEntry::new_interim(
                    interim_text,
                    Some(self.config.interim_confidence),
                    captured_at,
                );
                store.set_interim(entry.clone());
                return ReconcileOutcome::InterimUpdated(entry);
            }
        }

        if has_final && store.clear_interim() {
            return ReconcileOutcome::InterimCleared;
        }
        ReconcileOutcome::Unchanged
    }

    /// Register a manually entered final so later recognition of the same
    /// words is treated as a duplicate
    pub fn commit_manual(&mut self, entry: TranscriptEntry, store: &mut TranscriptStore) -> bool {
        let text = entry.text.clone();
        if store.commit_final(entry) {
            self.remember(&text);
            true
        } else {
            false
        }
    }

    fn accepts_final(&self, text: &str, store: &TranscriptStore) -> bool {
        if text.chars().count() <= self.config.min_final_chars {
            return false;
        }
        !self.is_known(text, store)
    }

    /// Seen as the last commit, inside the rolling window, or in the store
    fn is_known(&self, text: &str, store: &TranscriptStore) -> bool {
        let key = dedup_key(text);
        if key.is_empty() {
            return false;
        }
        self.last_committed.as_deref() == Some(key.as_str())
            || self.recent_finals.iter().any(|recent| *recent == key)
            || store.contains_final_text(text)
    }

    fn remember(&mut self, text: &str) {
        let key = dedup_key(text);
        self.last_committed = Some(key.clone());
        self.recent_finals.push_back(key);
        while self.recent_finals.len() > self.config.dedup_window.max(1) {
            self.recent_finals.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::types::{RecognitionAlternative, RecognitionResult};

    fn setup() -> (ResultReconciler, TranscriptStore, Instant) {
        (
            ResultReconciler::new(ReconcilerConfig::default()),
            TranscriptStore::new(),
            Instant::now(),
        )
    }

    fn interim(text: &str) -> ResultBatch {
        ResultBatch::new(vec![RecognitionResult::interim(text)])
    }

    fn fin(text: &str) -> ResultBatch {
        ResultBatch::new(vec![RecognitionResult::final_text(text)])
    }

    #[test]
    fn test_growing_interims_then_final() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();

        rec.process(&interim("what is"), t0, now, &mut store);
        rec.process(&interim("what is your"), t0 + Duration::from_millis(200), now, &mut store);
        assert_eq!(store.len(), 1);
        assert_eq!(store.interim().unwrap().text, "what is your");

        let outcome = rec.process(&fin("what is your name"), t0 + Duration::from_millis(400), now, &mut store);
        assert!(matches!(outcome, ReconcileOutcome::Committed(_)));
        assert_eq!(store.len(), 1);
        assert!(store.interim().is_none());
        assert_eq!(store.latest_final().unwrap().text, "what is your name");
    }

    #[test]
    fn test_identical_finals_commit_once() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&fin("tell me about yourself"), t0, now, &mut store);
        let second = rec.process(&fin("tell me about yourself"), t0 + Duration::from_millis(300), now, &mut store);
        assert_eq!(second, ReconcileOutcome::Unchanged);
        assert_eq!(store.final_count(), 1);
    }

    #[test]
    fn test_replayed_finals_never_grow_transcript() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        let texts = ["first question here", "second question here", "third question here"];
        for (i, text) in texts.iter().enumerate() {
            rec.process(&fin(text), t0 + Duration::from_millis(i as u64 * 500), now, &mut store);
        }
        let committed = store.final_count();
        for (i, text) in texts.iter().cycle().take(12).enumerate() {
            rec.process(&fin(&text.to_uppercase()), t0 + Duration::from_secs(10 + i as u64), now, &mut store);
            assert_eq!(store.final_count(), committed);
        }
    }

    #[test]
    fn test_buffer_replay_from_start_commits_nothing_new() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        let first = RecognitionResult::final_text("tell me about yourself");
        let second = RecognitionResult::final_text("why this company");

        rec.process(&ResultBatch::with_index(0, vec![first.clone()]), t0, now, &mut store);
        rec.process(
            &ResultBatch::with_index(1, vec![first.clone(), second.clone()]),
            t0 + Duration::from_millis(500),
            now,
            &mut store,
        );
        assert_eq!(store.final_count(), 2);

        let outcome = rec.process(
            &ResultBatch::with_index(0, vec![first, second]),
            t0 + Duration::from_secs(1),
            now,
            &mut store,
        );
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        let texts: Vec<&str> = store.finals().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["tell me about yourself", "why this company"]);
    }

    #[test]
    fn test_replay_with_new_tail_commits_only_the_tail() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&fin("tell me about yourself"), t0, now, &mut store);

        let outcome = rec.process(
            &ResultBatch::with_index(0, vec![
                RecognitionResult::final_text("tell me about yourself"),
                RecognitionResult::final_text("and your last role"),
            ]),
            t0 + Duration::from_secs(1),
            now,
            &mut store,
        );
        assert!(matches!(outcome, ReconcileOutcome::Committed(ref e) if e.text == "and your last role"));
        assert_eq!(store.final_count(), 2);
    }

    #[test]
    fn test_finals_are_never_throttled() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&interim("so what"), t0, now, &mut store);
        let outcome = rec.process(&fin("so what do you do"), t0 + Duration::from_millis(10), now, &mut store);
        assert!(matches!(outcome, ReconcileOutcome::Committed(_)));
    }

    #[test]
    fn test_interim_throttled_inside_interval() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&interim("hello"), t0, now, &mut store);
        let outcome = rec.process(&interim("hello there"), t0 + Duration::from_millis(50), now, &mut store);
        assert_eq!(outcome, ReconcileOutcome::Throttled);
        assert_eq!(store.interim().unwrap().text, "hello");
    }

    #[test]
    fn test_trivial_final_ignored() {
        let (mut rec, mut store, t0) = setup();
        let outcome = rec.process(&fin("uh"), t0, Utc::now(), &mut store);
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(store.is_empty());
    }

    #[test]
    fn test_interim_matching_last_final_is_ignored() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&fin("why this company"), t0, now, &mut store);
        let outcome = rec.process(&interim("Why this company"), t0 + Duration::from_secs(1), now, &mut store);
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(store.interim().is_none());
    }

    #[test]
    fn test_duplicate_final_clears_stale_interim() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&fin("walk me through your resume"), t0, now, &mut store);
        rec.process(&interim("walk me through"), t0 + Duration::from_secs(1), now, &mut store);
        assert!(store.interim().is_some());
        let outcome = rec.process(&fin("walk me through your resume"), t0 + Duration::from_secs(2), now, &mut store);
        assert_eq!(outcome, ReconcileOutcome::InterimCleared);
        assert!(store.interim().is_none());
        assert_eq!(store.final_count(), 1);
    }

    #[test]
    fn test_reset_allows_recommit() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&fin("describe a conflict"), t0, now, &mut store);
        store.clear();
        rec.reset();
        let outcome = rec.process(&fin("describe a conflict"), t0 + Duration::from_secs(1), now, &mut store);
        assert!(matches!(outcome, ReconcileOutcome::Committed(_)));
    }

    #[test]
    fn test_interims_disabled() {
        let config = ReconcilerConfig {
            interim_results_enabled: false,
            ..ReconcilerConfig::default()
        };
        let mut rec = ResultReconciler::new(config);
        let mut store = TranscriptStore::new();
        let outcome = rec.process(&interim("partial words"), Instant::now(), Utc::now(), &mut store);
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert!(store.is_empty());
    }

    #[test]
    fn test_engine_confidence_is_kept() {
        let (mut rec, mut store, t0) = setup();
        let batch = ResultBatch::new(vec![RecognitionResult {
            is_final: true,
            alternatives: vec![
                RecognitionAlternative::new("what are your strengths", Some(0.92)),
                RecognitionAlternative::new("what are your strength", Some(0.41)),
            ],
        }]);
        rec.process(&batch, t0, Utc::now(), &mut store);
        let entry = store.latest_final().unwrap();
        assert_eq!(entry.text, "what are your strengths");
        assert!((entry.confidence.unwrap() - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rolling_window_rejects_older_repeat() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        rec.process(&fin("first answer text"), t0, now, &mut store);
        rec.process(&fin("second answer text"), t0 + Duration::from_secs(1), now, &mut store);
        // Older repeat is caught by the window even after the transcript is cleared
        store.clear();
        let outcome = rec.process(&fin("first answer text"), t0 + Duration::from_secs(2), now, &mut store);
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
    }

    #[test]
    fn test_single_interim_invariant_over_mixed_stream() {
        let (mut rec, mut store, t0) = setup();
        let now = Utc::now();
        let stream = [
            interim("how"),
            interim("how do"),
            interim("how do you"),
            fin("how do you handle pressure"),
            interim("and"),
            interim("and what"),
            fin("and what motivates you"),
            interim("thanks"),
        ];
        for (i, batch) in stream.iter().enumerate() {
            rec.process(batch, t0 + Duration::from_millis(i as u64 * 250), now, &mut store);
            assert!(store.entries().iter().filter(|e| e.is_interim()).count() <= 1);
        }
        assert_eq!(store.final_count(), 2);
        assert_eq!(store.interim().unwrap().text, "thanks");
    }
}
