//! The world model: entries (characters, locations, items, …) with static
//! descriptions and dynamic state, and chapters archiving closed ranges of
//! the story log.

use serde::{Deserialize, Serialize};

use crate::story::new_id;

/// Relationship bounds for character standing.
pub const RELATIONSHIP_MIN: i32 = -100;
pub const RELATIONSHIP_MAX: i32 = 100;

/// Clamp a relationship level into `[-100, 100]`.
pub fn clamp_relationship(value: i32) -> i32 {
    value.clamp(RELATIONSHIP_MIN, RELATIONSHIP_MAX)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Kind of world-model record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Character,
    Location,
    Item,
    Faction,
    Concept,
    Event,
}

/// Per-kind dynamic state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryState {
    Character {
        #[serde(default)]
        is_present: bool,
        #[serde(default)]
        disposition: Option<String>,
        /// Standing toward the protagonist, clamped to `[-100, 100]`.
        #[serde(default)]
        relationship: i32,
    },
    Location {
        #[serde(default)]
        is_current_location: bool,
        #[serde(default)]
        visited: bool,
    },
    Item {
        #[serde(default)]
        in_inventory: bool,
        #[serde(default)]
        holder: Option<String>,
    },
    Faction {
        #[serde(default)]
        reputation: i32,
    },
    Concept,
    Event {
        #[serde(default)]
        resolved: bool,
    },
}

impl EntryState {
    /// The zero-value state for a given entry kind.
    pub fn default_for(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Character => EntryState::Character {
                is_present: false,
                disposition: None,
                relationship: 0,
            },
            EntryKind::Location => EntryState::Location {
                is_current_location: false,
                visited: false,
            },
            EntryKind::Item => EntryState::Item {
                in_inventory: false,
                holder: None,
            },
            EntryKind::Faction => EntryState::Faction { reputation: 0 },
            EntryKind::Concept => EntryState::Concept,
            EntryKind::Event => EntryState::Event { resolved: false },
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, EntryState::Character { is_present: true, .. })
    }

    pub fn in_inventory(&self) -> bool {
        matches!(self, EntryState::Item { in_inventory: true, .. })
    }

    pub fn is_current_location(&self) -> bool {
        matches!(
            self,
            EntryState::Location {
                is_current_location: true,
                ..
            }
        )
    }
}

/// How an entry is injected into narrator prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMode {
    Always,
    Keyword,
    Relevant,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionPolicy {
    #[serde(default = "d_relevant")]
    pub mode: InjectionMode,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

impl Default for InjectionPolicy {
    fn default() -> Self {
        Self {
            mode: InjectionMode::Relevant,
            keywords: Vec::new(),
            priority: 0,
        }
    }
}

fn d_relevant() -> InjectionMode {
    InjectionMode::Relevant
}

/// Who created an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    /// Authored during setup or by the user.
    Author,
    /// Created by the classification pass.
    Classifier,
}

/// Mention bookkeeping. `first_mentioned` / `last_mentioned` hold story
/// entry ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub first_mentioned: Option<String>,
    pub last_mentioned: Option<String>,
    pub mention_count: u32,
    pub created_by: EntryOrigin,
}

impl Provenance {
    pub fn authored() -> Self {
        Self {
            first_mentioned: None,
            last_mentioned: None,
            mention_count: 0,
            created_by: EntryOrigin::Author,
        }
    }

    pub fn classified(narration_id: &str) -> Self {
        Self {
            first_mentioned: Some(narration_id.to_owned()),
            last_mentioned: Some(narration_id.to_owned()),
            mention_count: 1,
            created_by: EntryOrigin::Classifier,
        }
    }
}

/// A world-model record, injectable into narrator prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    pub description: String,
    /// Alternative names; unique within a story, compared case-insensitively.
    #[serde(default)]
    pub aliases: Vec<String>,
    pub state: EntryState,
    #[serde(default)]
    pub injection: InjectionPolicy,
    pub provenance: Provenance,
}

impl Entry {
    /// Create an authored entry with the kind's default state.
    pub fn new(name: impl Into<String>, kind: EntryKind, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            kind,
            description: description.into(),
            aliases: Vec::new(),
            state: EntryState::default_for(kind),
            injection: InjectionPolicy::default(),
            provenance: Provenance::authored(),
        }
    }

    /// Case-insensitive match against the entry's name or any alias.
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name.eq_ignore_ascii_case(candidate)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(candidate))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A closed, contiguous range of story entries with a model-written
/// summary; the unit of long-term memory retrieval. Never updated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    /// Ordinal starting at 1, contiguous per story.
    pub number: u32,
    pub start_entry_id: String,
    pub end_entry_id: String,
    pub start_seq: u64,
    pub end_seq: u64,
    /// Equals `end_seq - start_seq + 1`.
    pub entry_count: u64,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub plot_threads: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arc_id: Option<String>,
}
