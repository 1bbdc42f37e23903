//! The append-only story log model.
//!
//! A story is a sequence of immutable [`StoryEntry`] records: user actions,
//! narrated passages, and system notices. Entries are never mutated after
//! being appended; chapters later bracket closed ranges of them.

use serde::{Deserialize, Serialize};

/// Generate a process-unique opaque id token.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in integer milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Role of a line in the story log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryRole {
    UserAction,
    Narration,
    System,
}

/// One immutable line of the story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryEntry {
    pub id: String,
    pub role: StoryRole,
    /// Monotonically increasing position in the story log.
    pub seq: u64,
    pub content: String,
    /// Creation time in integer milliseconds.
    pub timestamp_ms: i64,
    /// Back-reference to the chapter that archived this entry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
}

impl StoryEntry {
    pub fn new(role: StoryRole, seq: u64, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            seq,
            content: content.into(),
            timestamp_ms: now_ms(),
            chapter_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn entry_roundtrips_through_json() {
        let entry = StoryEntry::new(StoryRole::UserAction, 3, "I open the door.");
        let json = serde_json::to_string(&entry).unwrap();
        let back: StoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seq, 3);
        assert_eq!(back.role, StoryRole::UserAction);
        assert_eq!(back.content, "I open the door.");
        assert!(back.chapter_id.is_none());
    }
}
