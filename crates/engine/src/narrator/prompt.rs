//! Narrator prompt assembly.
//!
//! Composes, in order: the mode-specific system prompt, a
//! `[STORY CONTEXT]` block (current location, present characters with
//! dispositions, inventory, selected entries, retrieved memory), then
//! the most recent conversation window under a token budget. Oldest
//! messages are evicted first; the current user input is never evicted.

use av_domain::config::StoryMode;
use av_domain::message::Message;
use av_domain::story::{StoryEntry, StoryRole};
use av_domain::world::Entry;

use crate::util::approx_tokens;
use crate::world::{state_summary, WorldSnapshot};

const ADVENTURE_SYSTEM_PROMPT: &str = "\
You are the narrator of an interactive adventure. Describe the world in \
second person, present tense, with concrete sensory detail. React to the \
player's action and stop at a natural beat that invites the next action. \
Never speak for the player or decide their feelings. Stay consistent with \
the story context below.";

const CREATIVE_SYSTEM_PROMPT: &str = "\
You are a co-author continuing a work of fiction. Match the established \
prose style, point of view, and tense. Continue from the latest passage \
with vivid, economical prose, and end at a moment that leaves room for \
the story to go somewhere. Stay consistent with the story context below.";

/// Inputs for one prompt build.
pub struct PromptInputs<'a> {
    pub mode: StoryMode,
    pub snapshot: &'a WorldSnapshot,
    /// Entries chosen by selection, already in injection order.
    pub selected: &'a [Entry],
    pub retrieved_context: Option<&'a str>,
    /// The story log up to (not including) the current user input.
    pub history: &'a [StoryEntry],
    pub user_input: &'a str,
    /// Token budget for the conversation window.
    pub history_token_budget: usize,
}

/// Build the ordered message list for the narrator call.
pub fn build_messages(inputs: &PromptInputs<'_>) -> Vec<Message> {
    let system_prompt = match inputs.mode {
        StoryMode::Adventure => ADVENTURE_SYSTEM_PROMPT,
        StoryMode::CreativeWriting => CREATIVE_SYSTEM_PROMPT,
    };

    let mut system = String::with_capacity(1024);
    system.push_str(system_prompt);
    system.push_str("\n\n");
    system.push_str(&story_context_block(
        inputs.snapshot,
        inputs.selected,
        inputs.retrieved_context,
    ));

    let mut messages = vec![Message::system(system)];
    messages.extend(conversation_window(
        inputs.history,
        inputs.history_token_budget,
    ));
    messages.push(Message::user(inputs.user_input));
    messages
}

fn story_context_block(
    snapshot: &WorldSnapshot,
    selected: &[Entry],
    retrieved: Option<&str>,
) -> String {
    let mut block = String::from("[STORY CONTEXT]\n");

    let location = snapshot
        .current_location()
        .map(|e| e.name.clone())
        .unwrap_or_else(|| "unknown".into());
    block.push_str(&format!("Current location: {location}\n"));

    let present = snapshot.present_characters();
    if present.is_empty() {
        block.push_str("Present characters: none\n");
    } else {
        let names: Vec<String> = present
            .iter()
            .map(|e| {
                let summary = state_summary(&e.state);
                if summary.is_empty() {
                    e.name.clone()
                } else {
                    format!("{} ({summary})", e.name)
                }
            })
            .collect();
        block.push_str(&format!("Present characters: {}\n", names.join(", ")));
    }

    let inventory = snapshot.inventory();
    if !inventory.is_empty() {
        let names: Vec<&str> = inventory.iter().map(|e| e.name.as_str()).collect();
        block.push_str(&format!("Inventory: {}\n", names.join(", ")));
    }

    if !selected.is_empty() {
        block.push_str("Known entries:\n");
        for entry in selected {
            let summary = state_summary(&entry.state);
            if summary.is_empty() {
                block.push_str(&format!("- {}: {}\n", entry.name, entry.description));
            } else {
                block.push_str(&format!(
                    "- {}: {} [{summary}]\n",
                    entry.name, entry.description
                ));
            }
        }
    }

    if let Some(retrieved) = retrieved {
        if !retrieved.is_empty() {
            block.push_str("Relevant memory from earlier chapters:\n");
            block.push_str(retrieved);
            block.push('\n');
        }
    }

    block
}

/// The newest history messages that fit the budget, oldest first.
fn conversation_window(history: &[StoryEntry], token_budget: usize) -> Vec<Message> {
    let mut window = Vec::new();
    let mut used = 0usize;

    for entry in history.iter().rev() {
        let cost = approx_tokens(&entry.content);
        if used + cost > token_budget {
            break;
        }
        used += cost;
        window.push(entry);
    }

    window
        .into_iter()
        .rev()
        .map(|entry| match entry.role {
            StoryRole::UserAction => Message::user(&entry.content),
            StoryRole::Narration => Message::assistant(&entry.content),
            StoryRole::System => Message::system(&entry.content),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_domain::world::{EntryKind, EntryState};

    fn snapshot() -> WorldSnapshot {
        let mut cellar = Entry::new("Cellar", EntryKind::Location, "A damp cellar.");
        cellar.state = EntryState::Location {
            is_current_location: true,
            visited: true,
        };
        let mut thornwick = Entry::new("Thornwick", EntryKind::Character, "A wary innkeeper.");
        thornwick.state = EntryState::Character {
            is_present: true,
            disposition: Some("wary".into()),
            relationship: 0,
        };
        WorldSnapshot {
            entries: vec![cellar, thornwick],
        }
    }

    fn history(n: usize) -> Vec<StoryEntry> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 {
                    StoryRole::UserAction
                } else {
                    StoryRole::Narration
                };
                StoryEntry::new(role, i as u64 + 1, format!("history message {i}"))
            })
            .collect()
    }

    #[test]
    fn system_message_carries_context_block() {
        let snap = snapshot();
        let history = history(2);
        let messages = build_messages(&PromptInputs {
            mode: StoryMode::Adventure,
            snapshot: &snap,
            selected: &snap.entries,
            retrieved_context: Some("Chapter 2: Thornwick owes the player a favor."),
            history: &history,
            user_input: "I open the door.",
            history_token_budget: 1000,
        });

        let system = &messages[0];
        assert!(system.content.contains("[STORY CONTEXT]"));
        assert!(system.content.contains("Current location: Cellar"));
        assert!(system.content.contains("Thornwick"));
        assert!(system.content.contains("owes the player a favor"));
        // Last message is always the current input.
        assert_eq!(messages.last().unwrap().content, "I open the door.");
    }

    #[test]
    fn creative_mode_uses_a_different_system_prompt() {
        let snap = WorldSnapshot::default();
        let adventure = build_messages(&PromptInputs {
            mode: StoryMode::Adventure,
            snapshot: &snap,
            selected: &[],
            retrieved_context: None,
            history: &[],
            user_input: "go",
            history_token_budget: 100,
        });
        let creative = build_messages(&PromptInputs {
            mode: StoryMode::CreativeWriting,
            snapshot: &snap,
            selected: &[],
            retrieved_context: None,
            history: &[],
            user_input: "go",
            history_token_budget: 100,
        });
        assert_ne!(adventure[0].content, creative[0].content);
    }

    #[test]
    fn window_evicts_oldest_first_and_keeps_current_input() {
        let snap = WorldSnapshot::default();
        let history = history(10);
        // Each message is ~5 tokens; budget fits roughly three.
        let messages = build_messages(&PromptInputs {
            mode: StoryMode::Adventure,
            snapshot: &snap,
            selected: &[],
            retrieved_context: None,
            history: &history,
            user_input: "the current input",
            history_token_budget: 15,
        });

        // system + window + current input. Each history message costs
        // 5 approximate tokens, so a budget of 15 keeps the newest three.
        let window: Vec<&str> = messages[1..messages.len() - 1]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            window,
            vec!["history message 7", "history message 8", "history message 9"]
        );
        assert_eq!(messages.last().unwrap().content, "the current input");
    }

    #[test]
    fn zero_budget_still_sends_the_input() {
        let snap = WorldSnapshot::default();
        let history = history(4);
        let messages = build_messages(&PromptInputs {
            mode: StoryMode::Adventure,
            snapshot: &snap,
            selected: &[],
            retrieved_context: None,
            history: &history,
            user_input: "still here",
            history_token_budget: 0,
        });
        assert_eq!(messages.len(), 2); // system + input
        assert_eq!(messages.last().unwrap().content, "still here");
    }
}
