//! The classification pass: free-form narration in, typed world deltas
//! out.
//!
//! The raw response is parsed against the
//! [`ClassificationResult`] schema. On a parse failure the request is
//! retried, up to the policy's attempt count, with a stricter
//! valid-JSON-only reminder and exponential backoff. Persistent failure
//! is non-fatal: the coordinator proceeds without state updates.

use std::sync::Arc;

use av_domain::classification::ClassificationResult;
use av_domain::config::{ModelRole, StoryConfig, StoryMode};
use av_domain::error::{Error, Result};
use av_domain::message::Message;
use av_providers::traits::TOOL_TEMPERATURE;
use av_providers::{ChatRequest, ModelRouter, RetryPolicy};

use crate::util::parse_lenient;
use crate::world::WorldSnapshot;

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You extract structured world-state changes from a passage of interactive \
fiction. Be conservative: record only changes the passage clearly \
supports, and leave everything else out. Rules:\n\
- `updates` may only reference entry ids from the known-entries list.\n\
- Add a `newEntries` item only when nothing in the known-entries list \
matches the name or an alias (case-insensitive).\n\
- `scene.presentCharacterIds` lists everyone in the scene after the \
passage, by id (or by name for entries you just created). Omit it if \
the passage leaves presence unclear.\n\
- Respond with a single JSON object, no prose.\n\
Schema:\n\
{\"visualElements\": [{\"textSpan\": \"\", \"type\": \"\", \"importance\": 0.0, \
\"imagePrompt\": \"\", \"generateImmediately\": false}], \
\"entryUpdates\": {\"updates\": [{\"entryId\": \"\", \"changes\": {}}], \
\"newEntries\": [{\"name\": \"\", \"type\": \"character\", \"description\": \"\", \
\"aliases\": [], \"initialState\": {}}], \
\"scene\": {\"newLocationName\": null, \"presentCharacterIds\": [], \
\"timeProgression\": null}}, \
\"chapterAnalysis\": {\"shouldCreateChapter\": false, \"reason\": null, \
\"suggestedTitle\": null}, \
\"voiceContext\": {\"primarySpeaker\": null, \"mood\": null}}";

const STRICT_JSON_REMINDER: &str = "\
Your previous reply was not valid JSON. Respond again with ONLY a single \
valid JSON object matching the schema: no prose, no code fences, no \
explanation.";

pub struct Classifier {
    router: Arc<ModelRouter>,
    policy: RetryPolicy,
}

impl Classifier {
    pub fn new(router: Arc<ModelRouter>, policy: RetryPolicy) -> Self {
        Self { router, policy }
    }

    /// Classify one narration entry against the pre-turn world snapshot.
    pub async fn classify(
        &self,
        narration: &str,
        user_action: &str,
        snapshot: &WorldSnapshot,
        config: &StoryConfig,
    ) -> Result<ClassificationResult> {
        let (provider, model) = self.router.resolve(ModelRole::Classifier)?;

        let mode_line = match config.mode {
            StoryMode::Adventure => "adventure",
            StoryMode::CreativeWriting => "creative-writing",
        };
        let known = if snapshot.entries.is_empty() {
            "(none)".to_owned()
        } else {
            snapshot.digest()
        };
        let payload = format!(
            "Story mode: {mode_line}\n\nKnown entries (id | name | kind):\n{known}\n\n\
             Player action:\n{user_action}\n\nNarrated passage:\n{narration}"
        );

        let base_messages = vec![
            Message::system(CLASSIFIER_SYSTEM_PROMPT),
            Message::user(payload),
        ];

        let mut attempt: u32 = 0;
        loop {
            let mut messages = base_messages.clone();
            if attempt > 0 {
                messages.push(Message::user(STRICT_JSON_REMINDER));
            }
            let req = ChatRequest {
                model: Some(model.clone()),
                messages,
                temperature: Some(TOOL_TEMPERATURE),
                max_tokens: Some(2048),
                ..Default::default()
            };

            let failure: Error = match provider.complete(&req).await {
                Ok(resp) => match parse_lenient::<ClassificationResult>(&resp.content) {
                    Ok(result) => return Ok(result),
                    Err(e) => e,
                },
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            attempt += 1;
            if attempt >= self.policy.max_attempts {
                return Err(Error::Schema(format!(
                    "classification failed after {attempt} attempts: {failure}"
                )));
            }
            let delay = self.policy.delay_for_attempt(attempt - 1);
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "classification attempt failed, retrying with stricter prompt"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
