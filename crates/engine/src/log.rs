//! The append-only story log.
//!
//! Entries are appended with monotonically increasing sequence numbers
//! (starting at 1) and never mutated. The coordinator owns appends;
//! engines read ranges for chapter content and recent windows.

use av_domain::story::{StoryEntry, StoryRole};

#[derive(Default)]
pub struct StoryLog {
    entries: Vec<StoryEntry>,
}

impl StoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence the next appended entry will receive.
    pub fn next_seq(&self) -> u64 {
        self.entries.last().map_or(1, |e| e.seq + 1)
    }

    /// Append a new entry and return a copy of it.
    pub fn append(&mut self, role: StoryRole, content: &str) -> StoryEntry {
        let entry = StoryEntry::new(role, self.next_seq(), content);
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[StoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<StoryEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }

    /// Entries with `start_seq <= seq <= end_seq`.
    pub fn range(&self, start_seq: u64, end_seq: u64) -> Vec<StoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.seq >= start_seq && e.seq <= end_seq)
            .cloned()
            .collect()
    }

    /// Entries with `seq > after_seq`, oldest first.
    pub fn since_seq(&self, after_seq: u64) -> Vec<StoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.seq > after_seq)
            .cloned()
            .collect()
    }
}
