//! Tiered entry selection.
//!
//! - Tier 1, zero latency: entries that are part of the live scene
//!   (current location, present, in inventory) or marked always-inject.
//! - Tier 2, zero latency: case-insensitive whole-word match of names,
//!   aliases, and keyword-mode keywords against the recent window plus
//!   the new input.
//! - Tier 3, conditional: a model call over the remaining pool, only
//!   when it exceeds `llm_threshold`. Runs concurrently with memory
//!   retrieval, so it adds no critical-path latency.

use std::collections::HashSet;

use regex::Regex;

use av_domain::config::{InjectionScope, ModelRole};
use av_domain::error::Result;
use av_domain::message::Message;
use av_domain::story::StoryEntry;
use av_domain::world::{Entry, InjectionMode};
use av_providers::traits::TOOL_TEMPERATURE;
use av_providers::ChatRequest;

use crate::util::{approx_tokens, parse_lenient};
use crate::world::kind_label;

use super::EntryEngine;

const SELECTION_SYSTEM_PROMPT: &str = "\
You pick which story entries are relevant to the player's next action. \
Be selective: include an entry only when the action plausibly involves \
it. Respond with a JSON array of entry ids and nothing else.";

impl EntryEngine {
    /// Select the entries to inject for this turn.
    ///
    /// Infallible: a Tier-3 failure degrades to the Tier-1/2 result.
    pub async fn select(&self, user_input: &str, recent: &[StoryEntry]) -> Vec<Entry> {
        let pool = self.snapshot().entries;
        let scope = self.config().injection_mode;

        if scope == InjectionScope::All {
            return self.finalize(pool);
        }

        let mut selected: Vec<Entry> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        // ── Tier 1: state-based ────────────────────────────────────
        for entry in &pool {
            let in_scene = entry.state.is_current_location()
                || entry.state.is_present()
                || entry.state.in_inventory();
            if in_scene || entry.injection.mode == InjectionMode::Always {
                seen.insert(entry.id.clone());
                selected.push(entry.clone());
            }
        }

        if scope == InjectionScope::StateOnly {
            return self.finalize(selected);
        }

        // ── Tier 2: whole-word name matching ───────────────────────
        let haystack: String = recent
            .iter()
            .map(|m| m.content.as_str())
            .chain([user_input])
            .collect::<Vec<_>>()
            .join("\n");

        for entry in &pool {
            if seen.contains(&entry.id) || entry.injection.mode == InjectionMode::Never {
                continue;
            }
            let mut needles: Vec<&str> = vec![entry.name.as_str()];
            needles.extend(entry.aliases.iter().map(String::as_str));
            if entry.injection.mode == InjectionMode::Keyword {
                needles.extend(entry.injection.keywords.iter().map(String::as_str));
            }
            if needles.iter().any(|n| whole_word_match(&haystack, n)) {
                seen.insert(entry.id.clone());
                selected.push(entry.clone());
            }
        }

        // ── Tier 3: model-assisted, large pools only ───────────────
        let remaining: Vec<&Entry> = pool
            .iter()
            .filter(|e| !seen.contains(&e.id) && e.injection.mode != InjectionMode::Never)
            .collect();

        if self.config().enable_llm_selection && remaining.len() > self.config().llm_threshold {
            match self.llm_select(user_input, &remaining).await {
                Ok(ids) => {
                    for id in ids {
                        if let Some(entry) = pool.iter().find(|e| e.id == id) {
                            if seen.insert(id.clone()) {
                                selected.push(entry.clone());
                            }
                        } else {
                            tracing::debug!(entry_id = %id, "discarding unknown id from selection model");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "model-assisted selection failed, using tier 1/2 only");
                }
            }
        }

        self.finalize(selected)
    }

    /// Order by injection priority, then mention count, and truncate to
    /// the entry token budget.
    fn finalize(&self, mut selected: Vec<Entry>) -> Vec<Entry> {
        selected.sort_by(|a, b| {
            b.injection
                .priority
                .cmp(&a.injection.priority)
                .then(b.provenance.mention_count.cmp(&a.provenance.mention_count))
                .then(a.name.cmp(&b.name))
        });

        let budget = self.config().max_entry_tokens;
        let mut used = 0usize;
        let mut out = Vec::new();
        for entry in selected {
            let cost = approx_tokens(&entry.name) + approx_tokens(&entry.description);
            if used + cost > budget {
                break;
            }
            used += cost;
            out.push(entry);
        }
        out
    }

    async fn llm_select(&self, user_input: &str, remaining: &[&Entry]) -> Result<Vec<String>> {
        let (provider, model) = self.router().resolve(ModelRole::Retrieval)?;

        let digest: String = remaining
            .iter()
            .map(|e| {
                let mut description = e.description.clone();
                let mut cut = description.len().min(100);
                while !description.is_char_boundary(cut) {
                    cut -= 1;
                }
                description.truncate(cut);
                format!("{} | {} ({}) - {}", e.id, e.name, kind_label(e.kind), description)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Player input:\n{user_input}\n\nCandidate entries:\n{digest}\n\n\
             Return a JSON array of up to {} entry ids relevant to the \
             input. Return [] if none apply.",
            self.config().max_llm_selected
        );

        let req = ChatRequest {
            model: Some(model),
            messages: vec![Message::system(SELECTION_SYSTEM_PROMPT), Message::user(prompt)],
            temperature: Some(TOOL_TEMPERATURE),
            max_tokens: Some(512),
            ..Default::default()
        };

        let resp = provider.complete(&req).await?;
        let ids: Vec<String> = parse_lenient(&resp.content)?;
        Ok(ids
            .into_iter()
            .take(self.config().max_llm_selected)
            .collect())
    }
}

fn whole_word_match(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    let pattern = format!(r"(?i)\b{}\b", regex::escape(needle));
    Regex::new(&pattern).map(|re| re.is_match(haystack)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use av_domain::config::{EntryConfig, ModelConfig};
    use av_domain::story::StoryRole;
    use av_domain::world::{EntryKind, EntryState, InjectionPolicy};
    use av_events::EventBus;
    use av_providers::ProviderRegistry;

    fn engine(config: EntryConfig) -> EntryEngine {
        let router = Arc::new(av_providers::ModelRouter::new(
            Arc::new(ProviderRegistry::empty()),
            ModelConfig::default(),
        ));
        EntryEngine::new(config, router, EventBus::new())
    }

    fn character(name: &str) -> Entry {
        Entry::new(name, EntryKind::Character, format!("{name}, a character."))
    }

    fn recent(lines: &[&str]) -> Vec<StoryEntry> {
        lines
            .iter()
            .enumerate()
            .map(|(i, l)| StoryEntry::new(StoryRole::Narration, i as u64 + 1, *l))
            .collect()
    }

    #[test]
    fn whole_word_matching_is_case_insensitive_and_word_bounded() {
        assert!(whole_word_match("Remember THORNWICK?", "Thornwick"));
        assert!(whole_word_match("the Rusted Key glints", "rusted key"));
        assert!(!whole_word_match("thorny problems", "Thorn"));
        assert!(!whole_word_match("unthornwicked", "Thornwick"));
    }

    #[tokio::test]
    async fn tier1_selects_scene_state_and_always_mode() {
        let engine = engine(EntryConfig::default());

        let mut location = Entry::new("Cellar", EntryKind::Location, "A damp cellar.");
        location.state = EntryState::Location {
            is_current_location: true,
            visited: true,
        };
        engine.insert(location);

        let mut present = character("Thornwick");
        present.state = EntryState::Character {
            is_present: true,
            disposition: None,
            relationship: 0,
        };
        engine.insert(present);

        let mut always = Entry::new("The Pact", EntryKind::Concept, "An old oath.");
        always.injection = InjectionPolicy {
            mode: InjectionMode::Always,
            ..Default::default()
        };
        engine.insert(always);

        engine.insert(character("Offstage")); // not selected

        let selected = engine.select("I look around.", &[]).await;
        let names: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Cellar"));
        assert!(names.contains(&"Thornwick"));
        assert!(names.contains(&"The Pact"));
        assert!(!names.contains(&"Offstage"));
    }

    #[tokio::test]
    async fn tier2_matches_names_aliases_and_keywords_without_model_calls() {
        let engine = engine(EntryConfig::default());

        engine.insert(character("Thornwick"));

        let mut aliased = character("Seraphine");
        aliased.aliases.push("the witch".into());
        engine.insert(aliased);

        let mut keyworded = Entry::new("Ember Cult", EntryKind::Faction, "Fire worshippers.");
        keyworded.injection = InjectionPolicy {
            mode: InjectionMode::Keyword,
            keywords: vec!["bonfire".into()],
            priority: 0,
        };
        engine.insert(keyworded);

        engine.insert(character("Unrelated"));

        let recent = recent(&["A bonfire burns outside."]);
        let selected = engine
            .select("Remember Thornwick? I ask the witch about it.", &recent)
            .await;

        let names: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Thornwick"));
        assert!(names.contains(&"Seraphine"));
        assert!(names.contains(&"Ember Cult"));
        assert!(!names.contains(&"Unrelated"));
    }

    #[tokio::test]
    async fn never_mode_is_excluded_from_matching() {
        let engine = engine(EntryConfig::default());
        let mut hidden = character("Thornwick");
        hidden.injection.mode = InjectionMode::Never;
        engine.insert(hidden);

        let selected = engine.select("Remember Thornwick?", &[]).await;
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn state_only_scope_skips_name_matching() {
        let engine = engine(EntryConfig {
            injection_mode: InjectionScope::StateOnly,
            ..Default::default()
        });
        engine.insert(character("Thornwick"));

        let selected = engine.select("Remember Thornwick?", &[]).await;
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn ordering_is_priority_then_mentions_and_budget_truncates() {
        let engine = engine(EntryConfig {
            max_entry_tokens: 14,
            ..Default::default()
        });

        let mut low = character("Aaa");
        low.injection.priority = 1;
        low.state = EntryState::Character {
            is_present: true,
            disposition: None,
            relationship: 0,
        };
        engine.insert(low);

        let mut high = character("Bbb");
        high.injection.priority = 10;
        high.state = EntryState::Character {
            is_present: true,
            disposition: None,
            relationship: 0,
        };
        engine.insert(high);

        let mut frequent = character("Ccc");
        frequent.injection.priority = 1;
        frequent.provenance.mention_count = 9;
        frequent.state = EntryState::Character {
            is_present: true,
            disposition: None,
            relationship: 0,
        };
        engine.insert(frequent);

        // Each entry costs ~5 tokens (name 1 + description 4); a budget
        // of 14 keeps only the top two.
        let selected = engine.select("look", &[]).await;
        let names: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bbb", "Ccc"]);
    }
}
