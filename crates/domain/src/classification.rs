//! The classification schema: structured deltas extracted from a narrated
//! passage.
//!
//! Parsed from raw model output at the boundary. Unknown fields are
//! ignored; `entryUpdates` and `chapterAnalysis` are required, so their
//! absence fails the parse and triggers the classifier retry loop.
//! Everything else is tolerant of omission.

use serde::{Deserialize, Serialize};

use crate::world::EntryKind;

/// Output of the structured extraction pass over one narration entry.
/// Consumed at most once, then discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    #[serde(default)]
    pub visual_elements: Vec<VisualElement>,
    pub entry_updates: EntryUpdates,
    pub chapter_analysis: ChapterAnalysis,
    #[serde(default)]
    pub voice_context: VoiceContext,
    /// Creative-mode payload, forwarded verbatim to consumers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_updates: Option<serde_json::Value>,
}

/// A passage span worth illustrating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualElement {
    pub text_span: String,
    #[serde(rename = "type", default)]
    pub element_type: String,
    #[serde(default)]
    pub importance: f32,
    #[serde(default)]
    pub image_prompt: String,
    #[serde(default)]
    pub generate_immediately: bool,
}

/// World-model deltas: updates to known entries, freshly discovered
/// entries, and the scene block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryUpdates {
    pub updates: Vec<EntryUpdate>,
    pub new_entries: Vec<NewEntry>,
    pub scene: SceneUpdate,
}

impl EntryUpdates {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.new_entries.is_empty() && self.scene.is_noop()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    pub entry_id: String,
    #[serde(default)]
    pub changes: EntryChanges,
}

/// Field-level deltas. Only fields present in the JSON are applied; every
/// field here is optional so an absent key means "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryChanges {
    pub description: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub is_present: Option<bool>,
    pub disposition: Option<String>,
    pub relationship: Option<i32>,
    pub in_inventory: Option<bool>,
    pub holder: Option<String>,
    pub visited: Option<bool>,
    pub reputation: Option<i32>,
    pub resolved: Option<bool>,
}

impl EntryChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.aliases.is_none()
            && self.is_present.is_none()
            && self.disposition.is_none()
            && self.relationship.is_none()
            && self.in_inventory.is_none()
            && self.holder.is_none()
            && self.visited.is_none()
            && self.reputation.is_none()
            && self.resolved.is_none()
    }
}

/// A freshly discovered entry. Emitted by the classifier only when no
/// known entry matches by name or alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Merged over the kind's default state at creation.
    #[serde(default)]
    pub initial_state: EntryChanges,
}

/// Scene-level changes: location switch and character presence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneUpdate {
    pub new_location_name: Option<String>,
    pub present_character_ids: Vec<String>,
    /// Opaque to the core; surfaced to consumers unchanged.
    pub time_progression: Option<String>,
}

impl SceneUpdate {
    pub fn is_noop(&self) -> bool {
        self.new_location_name.is_none()
            && self.present_character_ids.is_empty()
            && self.time_progression.is_none()
    }
}

/// The classifier's opinion on chapter formation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterAnalysis {
    pub should_create_chapter: bool,
    pub reason: Option<String>,
    pub suggested_title: Option<String>,
}

/// Voice metadata for TTS consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceContext {
    pub primary_speaker: Option<String>,
    pub mood: Option<String>,
}
