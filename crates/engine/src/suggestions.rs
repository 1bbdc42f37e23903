//! Creative-mode follow-up suggestions.
//!
//! After a passage lands in creative-writing mode, three distinct
//! single-sentence continuations are requested and tagged with an
//! inferred type. Every failure path yields an empty list; suggestions
//! are never load-bearing.

use std::sync::Arc;

use av_domain::config::ModelRole;
use av_domain::message::Message;
use av_domain::suggestion::{Suggestion, SuggestionKind};
use av_providers::traits::NARRATION_TEMPERATURE;
use av_providers::{ChatRequest, ModelRouter};

use crate::util::parse_lenient;

const SUGGESTIONS_PROMPT: &str = "\
Offer three distinct one-sentence ways this story could continue. Vary \
the register: at least one concrete action, and consider a line of \
dialogue, a revelation, or a twist. Respond with a JSON array of three \
strings and nothing else.";

pub struct SuggestionEngine {
    router: Arc<ModelRouter>,
}

impl SuggestionEngine {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }

    /// Generate follow-up suggestions for the latest passage.
    pub async fn generate(&self, narration: &str, user_input: &str) -> Vec<Suggestion> {
        let (provider, model) = match self.router.resolve(ModelRole::Suggestions) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(error = %e, "no provider for suggestions");
                return Vec::new();
            }
        };

        let prompt = format!(
            "{SUGGESTIONS_PROMPT}\n\nLatest direction from the author:\n{user_input}\n\n\
             Latest passage:\n{narration}"
        );
        let req = ChatRequest {
            model: Some(model),
            messages: vec![Message::user(prompt)],
            temperature: Some(NARRATION_TEMPERATURE),
            max_tokens: Some(256),
            ..Default::default()
        };

        let resp = match provider.complete(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "suggestion generation failed");
                return Vec::new();
            }
        };

        let texts: Vec<String> = match parse_lenient(&resp.content) {
            Ok(texts) => texts,
            Err(e) => {
                tracing::debug!(error = %e, "suggestions were not a JSON array, dropping");
                return Vec::new();
            }
        };

        texts
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .take(3)
            .map(|text| {
                let kind = infer_kind(&text);
                Suggestion { text, kind }
            })
            .collect()
    }
}

/// Pair a continuation with its most plausible type.
fn infer_kind(text: &str) -> SuggestionKind {
    let trimmed = text.trim_start();
    if trimmed.starts_with('"') || trimmed.starts_with('\u{201c}') {
        return SuggestionKind::Dialogue;
    }
    let lower = text.to_lowercase();
    if ["says", "asks", "whispers", "shouts", "replies"]
        .iter()
        .any(|w| lower.contains(w))
    {
        return SuggestionKind::Dialogue;
    }
    if ["reveal", "realiz", "truth", "secret", "recogniz", "admits"]
        .iter()
        .any(|w| lower.contains(w))
    {
        return SuggestionKind::Revelation;
    }
    if ["suddenly", "unexpectedly", "instead", "betray"]
        .iter()
        .any(|w| lower.contains(w))
        || lower.starts_with("but ")
    {
        return SuggestionKind::Twist;
    }
    SuggestionKind::Action
}
