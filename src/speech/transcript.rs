// speech/transcript.rs
//
// Ordered transcript: immutable final entries followed by at most one interim entry.

use super::text::dedup_key;
use super::types::TranscriptEntry;

#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finals(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().filter(|e| e.is_final())
    }

    pub fn final_count(&self) -> usize {
        self.finals().count()
    }

    /// The pending interim entry, if any (always the last element)
    pub fn interim(&self) -> Option<&TranscriptEntry> {
        self.entries.last().filter(|e| e.is_interim())
    }

    pub fn latest_final(&self) -> Option<&TranscriptEntry> {
        self.entries.iter().rev().find(|e| e.is_final())
    }

    pub fn contains_final_text(&self, text: &str) -> bool {
        let key = dedup_key(text);
        self.finals().any(|e| dedup_key(&e.text) == key)
    }

    /// Append a final entry. Drops any pending interim entry, refuses text
    /// already present, and clamps the timestamp so finals never go backwards.
    /// Returns false when the entry was refused.
    pub fn commit_final(&mut self, mut entry: TranscriptEntry) -> bool {
        debug_assert!(entry.is_final());
        if self.contains_final_text(&entry.text) {
            self.clear_interim();
            return false;
        }

        self.clear_interim();
        if let Some(previous) = self.latest_final() {
            if entry.timestamp < previous.timestamp {
                entry.timestamp = previous.timestamp;
            }
        }
        self.entries.push(entry);
        true
    }

    /// Replace the pending interim entry (or add one)
    pub fn set_interim(&mut self, entry: TranscriptEntry) {
        debug_assert!(entry.is_interim());
        match self.entries.last_mut() {
            Some(last) if last.is_interim() => *last = entry,
            _ => self.entries.push(entry),
        }
    }

    /// Remove the pending interim entry. Returns true if one was removed.
    pub fn clear_interim(&mut self) -> bool {
        if self.interim().is_some() {
            self.entries.pop();
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn full_text(&self) -> String {
        self.finals().map(|e| e.text.as_str()).collect::<Vec<_>>().join(" ")
    }
}
