//! Read-only world snapshots.
//!
//! A [`WorldSnapshot`] is a consistent copy of the entry table captured
//! at a phase boundary. Phase-1/2/3 readers work against the snapshot;
//! Phase-4 writes cannot begin until those readers are done, so the
//! snapshot never observes a half-applied turn.

use av_domain::world::{Entry, EntryKind, EntryState};

#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub entries: Vec<Entry>,
}

impl WorldSnapshot {
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Case-insensitive lookup by name or alias.
    pub fn find_by_name(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.matches_name(name))
    }

    /// The location entry with `is_current_location` set, if any.
    pub fn current_location(&self) -> Option<&Entry> {
        self.entries.iter().find(|e| e.state.is_current_location())
    }

    /// Characters currently in the scene.
    pub fn present_characters(&self) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Character && e.state.is_present())
            .collect()
    }

    /// Items carried by the protagonist.
    pub fn inventory(&self) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Item && e.state.in_inventory())
            .collect()
    }

    /// One-line digest per entry, used by classifier and selection
    /// prompts so the model can reference entries by id.
    pub fn digest(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{} | {} | {}",
                    e.id,
                    e.name,
                    kind_label(e.kind)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(crate) fn kind_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Character => "character",
        EntryKind::Location => "location",
        EntryKind::Item => "item",
        EntryKind::Faction => "faction",
        EntryKind::Concept => "concept",
        EntryKind::Event => "event",
    }
}

/// Short human-readable state summary for prompt injection.
pub(crate) fn state_summary(state: &EntryState) -> String {
    match state {
        EntryState::Character {
            is_present,
            disposition,
            relationship,
        } => {
            let mut parts = Vec::new();
            if *is_present {
                parts.push("present".to_owned());
            }
            if let Some(d) = disposition {
                parts.push(d.clone());
            }
            if *relationship != 0 {
                parts.push(format!("relationship {relationship:+}"));
            }
            parts.join(", ")
        }
        EntryState::Location {
            is_current_location,
            visited,
        } => match (is_current_location, visited) {
            (true, _) => "current location".into(),
            (false, true) => "visited".into(),
            (false, false) => String::new(),
        },
        EntryState::Item {
            in_inventory,
            holder,
        } => {
            if *in_inventory {
                "in inventory".into()
            } else if let Some(h) = holder {
                format!("held by {h}")
            } else {
                String::new()
            }
        }
        EntryState::Faction { reputation } => {
            if *reputation != 0 {
                format!("reputation {reputation:+}")
            } else {
                String::new()
            }
        }
        EntryState::Concept => String::new(),
        EntryState::Event { resolved } => {
            if *resolved {
                "resolved".into()
            } else {
                "ongoing".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_domain::world::EntryState;

    fn snapshot_with_scene() -> WorldSnapshot {
        let mut cellar = Entry::new("Cellar", EntryKind::Location, "A damp cellar.");
        cellar.state = EntryState::Location {
            is_current_location: true,
            visited: true,
        };
        let mut thornwick = Entry::new("Thornwick", EntryKind::Character, "A wary innkeeper.");
        thornwick.state = EntryState::Character {
            is_present: true,
            disposition: Some("wary".into()),
            relationship: -5,
        };
        let mut key = Entry::new("Rusted Key", EntryKind::Item, "An old key.");
        key.state = EntryState::Item {
            in_inventory: true,
            holder: None,
        };
        WorldSnapshot {
            entries: vec![cellar, thornwick, key],
        }
    }

    #[test]
    fn scene_accessors_find_the_right_entries() {
        let snap = snapshot_with_scene();
        assert_eq!(snap.current_location().unwrap().name, "Cellar");
        assert_eq!(snap.present_characters().len(), 1);
        assert_eq!(snap.inventory()[0].name, "Rusted Key");
    }

    #[test]
    fn digest_lists_every_entry_with_id() {
        let snap = snapshot_with_scene();
        let digest = snap.digest();
        for entry in &snap.entries {
            assert!(digest.contains(&entry.id));
            assert!(digest.contains(&entry.name));
        }
    }

    #[test]
    fn state_summaries_read_naturally() {
        let snap = snapshot_with_scene();
        let thornwick = snap.find_by_name("thornwick").unwrap();
        let summary = state_summary(&thornwick.state);
        assert!(summary.contains("present"));
        assert!(summary.contains("wary"));
        assert!(summary.contains("relationship -5"));
    }
}
