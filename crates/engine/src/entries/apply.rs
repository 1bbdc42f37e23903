//! Delta application.
//!
//! Classifier output is folded into the table in the order
//! updates → new entries → scene. Unknown entry ids are dropped; only
//! fields present in a `changes` block are assigned; relationship levels
//! are clamped. Mention bookkeeping is keyed on the narration id, so
//! applying the same result twice leaves the table unchanged.

use std::collections::HashSet;

use av_domain::classification::{EntryChanges, EntryUpdates, NewEntry};
use av_domain::story::new_id;
use av_domain::world::{clamp_relationship, Entry, EntryKind, EntryState, Provenance};
use av_events::StoryEvent;

use super::EntryEngine;

impl EntryEngine {
    /// Apply one classification result against the table and emit
    /// `StateUpdated`. Returns the entries that actually changed.
    pub fn apply(&self, narration_id: &str, updates: &EntryUpdates) -> Vec<Entry> {
        let mut changed_ids: HashSet<String> = HashSet::new();

        {
            let mut table = self.table().write();

            // ── 1. Updates to known entries ────────────────────────
            for update in &updates.updates {
                let Some(entry) = table.get_mut(&update.entry_id) else {
                    tracing::debug!(
                        entry_id = %update.entry_id,
                        "dropping update for unknown entry"
                    );
                    continue;
                };
                let field_change = apply_changes(entry, &update.changes);
                let mention_change = touch_mention(entry, narration_id);
                if field_change || mention_change {
                    changed_ids.insert(entry.id.clone());
                }
            }

            // ── 2. New entries (skip known names and aliases) ──────
            for new_entry in &updates.new_entries {
                if let Some(existing) = table.values().find(|e| collides(e, new_entry)) {
                    tracing::debug!(
                        name = %new_entry.name,
                        existing_id = %existing.id,
                        "skipping new entry that matches a known entry"
                    );
                    continue;
                }
                let mut entry = Entry {
                    id: new_id(),
                    name: new_entry.name.clone(),
                    kind: new_entry.kind,
                    description: new_entry.description.clone(),
                    aliases: new_entry.aliases.clone(),
                    state: EntryState::default_for(new_entry.kind),
                    injection: Default::default(),
                    provenance: Provenance::classified(narration_id),
                };
                apply_changes(&mut entry, &new_entry.initial_state);
                changed_ids.insert(entry.id.clone());
                table.insert(entry.id.clone(), entry);
            }

            // ── 3. Scene block ─────────────────────────────────────
            let scene = &updates.scene;

            if let Some(location_name) = &scene.new_location_name {
                let target = table
                    .values()
                    .find(|e| e.kind == EntryKind::Location && e.matches_name(location_name))
                    .map(|e| e.id.clone());
                match target {
                    Some(target_id) => {
                        for entry in table.values_mut() {
                            if entry.kind != EntryKind::Location {
                                continue;
                            }
                            if let EntryState::Location {
                                is_current_location,
                                visited,
                            } = &mut entry.state
                            {
                                let should_be_current = entry.id == target_id;
                                if *is_current_location != should_be_current {
                                    *is_current_location = should_be_current;
                                    changed_ids.insert(entry.id.clone());
                                }
                                if should_be_current && !*visited {
                                    *visited = true;
                                    changed_ids.insert(entry.id.clone());
                                }
                            }
                        }
                    }
                    None => {
                        tracing::debug!(
                            location = %location_name,
                            "scene names a location with no matching entry"
                        );
                    }
                }
            }

            // Presence reset only when the classifier named who is
            // present; an empty list never empties the room.
            if !scene.present_character_ids.is_empty() {
                let present: HashSet<String> = scene
                    .present_character_ids
                    .iter()
                    .filter_map(|id_or_name| {
                        table
                            .values()
                            .find(|e| {
                                e.kind == EntryKind::Character
                                    && (e.id == *id_or_name || e.matches_name(id_or_name))
                            })
                            .map(|e| e.id.clone())
                    })
                    .collect();

                if !present.is_empty() {
                    for entry in table.values_mut() {
                        if entry.kind != EntryKind::Character {
                            continue;
                        }
                        if let EntryState::Character { is_present, .. } = &mut entry.state {
                            let should_be_present = present.contains(&entry.id);
                            if *is_present != should_be_present {
                                *is_present = should_be_present;
                                changed_ids.insert(entry.id.clone());
                            }
                        }
                    }
                }
            }
        }

        // Lock released before dispatch: handlers may read the table.
        let all = self.entries();
        let changed: Vec<Entry> = all
            .iter()
            .filter(|e| changed_ids.contains(&e.id))
            .cloned()
            .collect();
        self.bus().emit(StoryEvent::StateUpdated { entries: all });
        changed
    }
}

fn collides(existing: &Entry, candidate: &NewEntry) -> bool {
    existing.matches_name(&candidate.name)
        || candidate.aliases.iter().any(|a| existing.matches_name(a))
}

/// Assign only the fields present in `changes`. Returns whether anything
/// actually changed.
fn apply_changes(entry: &mut Entry, changes: &EntryChanges) -> bool {
    let mut dirty = false;

    if let Some(description) = &changes.description {
        if entry.description != *description {
            entry.description = description.clone();
            dirty = true;
        }
    }
    if let Some(aliases) = &changes.aliases {
        for alias in aliases {
            if !entry.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
                entry.aliases.push(alias.clone());
                dirty = true;
            }
        }
    }

    match &mut entry.state {
        EntryState::Character {
            is_present,
            disposition,
            relationship,
        } => {
            if let Some(p) = changes.is_present {
                if *is_present != p {
                    *is_present = p;
                    dirty = true;
                }
            }
            if let Some(d) = &changes.disposition {
                if disposition.as_deref() != Some(d.as_str()) {
                    *disposition = Some(d.clone());
                    dirty = true;
                }
            }
            if let Some(r) = changes.relationship {
                let clamped = clamp_relationship(r);
                if *relationship != clamped {
                    *relationship = clamped;
                    dirty = true;
                }
            }
        }
        EntryState::Location { visited, .. } => {
            if let Some(v) = changes.visited {
                if *visited != v {
                    *visited = v;
                    dirty = true;
                }
            }
        }
        EntryState::Item {
            in_inventory,
            holder,
        } => {
            if let Some(inv) = changes.in_inventory {
                if *in_inventory != inv {
                    *in_inventory = inv;
                    dirty = true;
                }
            }
            if let Some(h) = &changes.holder {
                if holder.as_deref() != Some(h.as_str()) {
                    *holder = Some(h.clone());
                    dirty = true;
                }
            }
        }
        EntryState::Faction { reputation } => {
            if let Some(r) = changes.reputation {
                if *reputation != r {
                    *reputation = r;
                    dirty = true;
                }
            }
        }
        EntryState::Concept => {}
        EntryState::Event { resolved } => {
            if let Some(r) = changes.resolved {
                if *resolved != r {
                    *resolved = r;
                    dirty = true;
                }
            }
        }
    }

    dirty
}

/// Record a mention of the entry in the given narration. Keyed on the
/// narration id so re-applying the same result is a no-op.
fn touch_mention(entry: &mut Entry, narration_id: &str) -> bool {
    if entry.provenance.last_mentioned.as_deref() == Some(narration_id) {
        return false;
    }
    if entry.provenance.first_mentioned.is_none() {
        entry.provenance.first_mentioned = Some(narration_id.to_owned());
    }
    entry.provenance.last_mentioned = Some(narration_id.to_owned());
    entry.provenance.mention_count += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use av_domain::classification::{EntryUpdate, SceneUpdate};
    use av_domain::config::{EntryConfig, ModelConfig};
    use av_events::EventBus;
    use av_providers::{ModelRouter, ProviderRegistry};

    fn engine() -> EntryEngine {
        let router = Arc::new(ModelRouter::new(
            Arc::new(ProviderRegistry::empty()),
            ModelConfig::default(),
        ));
        EntryEngine::new(EntryConfig::default(), router, EventBus::new())
    }

    fn character(name: &str) -> Entry {
        Entry::new(name, EntryKind::Character, format!("{name}."))
    }

    fn location(name: &str) -> Entry {
        Entry::new(name, EntryKind::Location, format!("{name}."))
    }

    fn updates_for(entry_id: &str, changes: EntryChanges) -> EntryUpdates {
        EntryUpdates {
            updates: vec![EntryUpdate {
                entry_id: entry_id.into(),
                changes,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn update_assigns_only_present_fields_and_clamps_relationship() {
        let engine = engine();
        let thornwick = character("Thornwick");
        let id = thornwick.id.clone();
        engine.insert(thornwick);

        engine.apply(
            "n1",
            &updates_for(
                &id,
                EntryChanges {
                    is_present: Some(true),
                    relationship: Some(500),
                    ..Default::default()
                },
            ),
        );

        let snap = engine.snapshot();
        let entry = snap.get(&id).unwrap();
        match &entry.state {
            EntryState::Character {
                is_present,
                disposition,
                relationship,
            } => {
                assert!(*is_present);
                assert!(disposition.is_none()); // untouched
                assert_eq!(*relationship, 100); // clamped
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(entry.provenance.mention_count, 1);
        assert_eq!(entry.provenance.last_mentioned.as_deref(), Some("n1"));
    }

    #[test]
    fn apply_is_idempotent() {
        let engine = engine();
        let thornwick = character("Thornwick");
        let id = thornwick.id.clone();
        engine.insert(thornwick);

        let updates = EntryUpdates {
            updates: vec![EntryUpdate {
                entry_id: id.clone(),
                changes: EntryChanges {
                    is_present: Some(true),
                    relationship: Some(10),
                    ..Default::default()
                },
            }],
            new_entries: vec![NewEntry {
                name: "Rusted Key".into(),
                kind: EntryKind::Item,
                description: "An old key.".into(),
                aliases: vec![],
                initial_state: EntryChanges {
                    in_inventory: Some(true),
                    ..Default::default()
                },
            }],
            scene: SceneUpdate::default(),
        };

        let first_changed = engine.apply("n1", &updates);
        assert!(!first_changed.is_empty());
        let after_first = engine.entries();

        let second_changed = engine.apply("n1", &updates);
        let after_second = engine.entries();

        assert!(second_changed.is_empty());
        assert_eq!(after_first.len(), after_second.len());
        for (a, b) in after_first.iter().zip(after_second.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.state, b.state);
            assert_eq!(a.provenance.mention_count, b.provenance.mention_count);
        }
    }

    #[test]
    fn unknown_entry_ids_are_dropped() {
        let engine = engine();
        engine.insert(character("Thornwick"));

        let changed = engine.apply(
            "n1",
            &updates_for(
                "no-such-id",
                EntryChanges {
                    is_present: Some(true),
                    ..Default::default()
                },
            ),
        );
        assert!(changed.is_empty());
    }

    #[test]
    fn new_entry_matching_known_alias_is_skipped() {
        let engine = engine();
        let mut seraphine = character("Seraphine");
        seraphine.aliases.push("the witch".into());
        engine.insert(seraphine);

        engine.apply(
            "n1",
            &EntryUpdates {
                new_entries: vec![NewEntry {
                    name: "The Witch".into(),
                    kind: EntryKind::Character,
                    description: "A witch.".into(),
                    aliases: vec![],
                    initial_state: EntryChanges::default(),
                }],
                ..Default::default()
            },
        );

        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn scene_location_switch_keeps_current_location_unique() {
        let engine = engine();
        let mut tavern = location("Tavern");
        tavern.state = EntryState::Location {
            is_current_location: true,
            visited: true,
        };
        engine.insert(tavern);
        engine.insert(location("Cellar"));

        engine.apply(
            "n1",
            &EntryUpdates {
                scene: SceneUpdate {
                    new_location_name: Some("Cellar".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let snap = engine.snapshot();
        let current: Vec<&Entry> = snap
            .entries
            .iter()
            .filter(|e| e.state.is_current_location())
            .collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "Cellar");
    }

    #[test]
    fn presence_list_sets_and_clears_character_presence() {
        let engine = engine();
        let mut here = character("Thornwick");
        here.state = EntryState::Character {
            is_present: true,
            disposition: None,
            relationship: 0,
        };
        engine.insert(here);
        let arriving = character("Seraphine");
        let arriving_id = arriving.id.clone();
        engine.insert(arriving);

        engine.apply(
            "n1",
            &EntryUpdates {
                scene: SceneUpdate {
                    present_character_ids: vec![arriving_id.clone()],
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let snap = engine.snapshot();
        assert!(snap.get(&arriving_id).unwrap().state.is_present());
        assert!(!snap.find_by_name("Thornwick").unwrap().state.is_present());
    }

    #[test]
    fn presence_resolves_fresh_entries_by_name() {
        let engine = engine();

        engine.apply(
            "n1",
            &EntryUpdates {
                new_entries: vec![NewEntry {
                    name: "Seraphine".into(),
                    kind: EntryKind::Character,
                    description: "A witch.".into(),
                    aliases: vec![],
                    initial_state: EntryChanges::default(),
                }],
                scene: SceneUpdate {
                    present_character_ids: vec!["Seraphine".into()],
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let snap = engine.snapshot();
        assert!(snap.find_by_name("Seraphine").unwrap().state.is_present());
    }

    #[test]
    fn empty_result_is_a_noop_but_still_emits_state_updated() {
        use av_events::EventKind;
        use parking_lot::Mutex;

        let engine = engine();
        engine.insert(character("Thornwick"));
        let before = engine.entries();

        let emitted = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&emitted);
        let _sub = engine
            .bus()
            .subscribe(EventKind::StateUpdated, move |_| *counter.lock() += 1);

        let changed = engine.apply("n1", &EntryUpdates::default());

        assert!(changed.is_empty());
        assert_eq!(*emitted.lock(), 1);
        let after = engine.entries();
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].state, after[0].state);
    }
}
