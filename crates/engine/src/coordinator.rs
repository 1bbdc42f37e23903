//! The turn coordinator: the five-phase state machine driven per user
//! input.
//!
//! Idle → Retrieving → Generating → Classifying → Applying → Idle. Each
//! phase happens-before the next; within Phase 1 retrieval and entry
//! selection run concurrently, and within Phase 4 entry application and
//! chapter creation run concurrently. Terminal failure appends a system
//! story entry and returns to idle. A busy coordinator rejects new input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};

use av_domain::config::{ModelRole, StoryConfig, StoryMode};
use av_domain::error::{Error, Result};
use av_domain::story::{StoryEntry, StoryRole};
use av_domain::stream::{StreamEvent, Usage};
use av_events::{EventBus, StoryEvent};
use av_providers::traits::NARRATION_TEMPERATURE;
use av_providers::{with_retry, ChatRequest, ModelRouter, RetryPolicy};

use crate::cancel::CancelToken;
use crate::chapters::ChapterEngine;
use crate::classifier::Classifier;
use crate::entries::EntryEngine;
use crate::log::StoryLog;
use crate::narrator::{build_messages, PromptInputs, SentenceSegmenter};
use crate::suggestions::SuggestionEngine;

/// Token budget for the narrator conversation window.
const HISTORY_TOKEN_BUDGET: usize = 4096;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnOutcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How a turn ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// A narration entry was appended and the turn ran to completion.
    Completed {
        message_id: String,
        usage: Usage,
        /// False when classification failed non-fatally; state updates
        /// and chapter checks were skipped.
        classified: bool,
        chapter_created: bool,
    },
    /// The narrator produced no text; no narration entry was appended.
    Empty,
    /// The turn was cancelled. The user entry is not rolled back.
    Cancelled,
    /// Terminal failure; a system entry carries the diagnostic.
    Failed { message: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnCoordinator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TurnCoordinator {
    config: StoryConfig,
    bus: EventBus,
    log: Arc<RwLock<StoryLog>>,
    entries: Arc<EntryEngine>,
    chapters: Arc<ChapterEngine>,
    classifier: Classifier,
    suggestions: Arc<SuggestionEngine>,
    router: Arc<ModelRouter>,
    retry: RetryPolicy,
    busy: AtomicBool,
    current_cancel: Mutex<CancelToken>,
}

/// Resets the busy flag on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TurnCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: StoryConfig,
        bus: EventBus,
        log: Arc<RwLock<StoryLog>>,
        entries: Arc<EntryEngine>,
        chapters: Arc<ChapterEngine>,
        classifier: Classifier,
        suggestions: Arc<SuggestionEngine>,
        router: Arc<ModelRouter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            bus,
            log,
            entries,
            chapters,
            classifier,
            suggestions,
            router,
            retry,
            busy: AtomicBool::new(false),
            current_cancel: Mutex::new(CancelToken::new()),
        }
    }

    /// Whether a turn is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Cancel the running turn, if any. The current stream terminates,
    /// no `NarrativeResponse` is emitted, and the coordinator returns to
    /// idle. Already-appended entries stay.
    pub fn cancel(&self) {
        self.current_cancel.lock().cancel();
    }

    /// Run one full turn for a user input.
    ///
    /// Rejects with [`Error::Busy`] while another turn is in flight;
    /// every other ending is reported through [`TurnOutcome`].
    pub async fn submit(&self, user_input: &str) -> Result<TurnOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        let cancel = CancelToken::new();
        *self.current_cancel.lock() = cancel.clone();

        Ok(self.run_turn(user_input, &cancel).await)
    }

    async fn run_turn(&self, user_input: &str, cancel: &CancelToken) -> TurnOutcome {
        // ── Phase 1: Retrieving ────────────────────────────────────
        let recent = self.log.read().recent(self.config.memory.recent_window);
        self.log.write().append(StoryRole::UserAction, user_input);
        self.bus.emit(StoryEvent::UserInput {
            content: user_input.to_owned(),
            mode: self.config.mode,
        });

        let (retrieved, selected) = tokio::join!(
            self.chapters.retrieve(user_input, &recent),
            self.entries.select(user_input, &recent),
        );
        if cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }

        self.bus.emit(StoryEvent::ContextReady {
            retrieved_context: retrieved.clone(),
            selected_entry_ids: selected.iter().map(|e| e.id.clone()).collect(),
        });

        // ── Phase 2: Generating ────────────────────────────────────
        let snapshot = self.entries.snapshot();
        let history: Vec<StoryEntry> = {
            let log = self.log.read();
            let entries = log.entries();
            // Everything before the just-appended user entry; the input
            // itself is carried separately and never evicted.
            entries[..entries.len().saturating_sub(1)].to_vec()
        };
        let messages = build_messages(&PromptInputs {
            mode: self.config.mode,
            snapshot: &snapshot,
            selected: &selected,
            retrieved_context: retrieved.as_deref(),
            history: &history,
            user_input,
            history_token_budget: HISTORY_TOKEN_BUDGET,
        });

        let (provider, model) = match self.router.resolve(ModelRole::Narrator) {
            Ok(resolved) => resolved,
            Err(e) => return self.fail_turn(e),
        };
        let req = ChatRequest {
            model: Some(model),
            messages,
            temperature: Some(NARRATION_TEMPERATURE),
            ..Default::default()
        };

        let mut stream = match with_retry(&self.retry, || provider.stream(&req)).await {
            Ok(stream) => stream,
            Err(e) => return self.fail_turn(e),
        };

        let mut segmenter = SentenceSegmenter::new();
        let mut full_response = String::new();
        let mut usage = Usage::default();

        while let Some(event) = stream.next().await {
            if cancel.is_cancelled() {
                // Dropping the stream releases the transport.
                drop(stream);
                tracing::debug!("turn cancelled mid-stream");
                return TurnOutcome::Cancelled;
            }
            match event {
                Ok(StreamEvent::Token { text }) => {
                    full_response.push_str(&text);
                    self.bus.emit(StoryEvent::ResponseStreaming {
                        chunk: text.clone(),
                        accumulated: full_response.clone(),
                    });
                    for sentence in segmenter.push(&text) {
                        self.bus.emit(StoryEvent::SentenceComplete { text: sentence });
                    }
                }
                Ok(StreamEvent::Done { usage: u, .. }) => {
                    if let Some(u) = u {
                        usage.accumulate(&u);
                    }
                    break;
                }
                Ok(StreamEvent::Error { message }) => {
                    return self.fail_turn(Error::Provider {
                        provider: provider.provider_id().to_owned(),
                        message,
                    });
                }
                Err(e) => return self.fail_turn(e),
            }
        }
        if let Some(tail) = segmenter.flush() {
            self.bus.emit(StoryEvent::SentenceComplete { text: tail });
        }

        if full_response.trim().is_empty() {
            tracing::debug!("narrator produced no text, ending turn");
            return TurnOutcome::Empty;
        }

        let narration = self
            .log
            .write()
            .append(StoryRole::Narration, &full_response);
        self.bus.emit(StoryEvent::NarrativeResponse {
            message_id: narration.id.clone(),
            content: full_response.clone(),
        });

        // ── Phase 3: Classifying ───────────────────────────────────
        if cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }
        let result = match self
            .classifier
            .classify(&full_response, user_input, &snapshot, &self.config)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                // Non-fatal: the turn ends without state updates.
                tracing::warn!(error = %e, "classification failed, skipping state updates");
                return TurnOutcome::Completed {
                    message_id: narration.id,
                    usage,
                    classified: false,
                    chapter_created: false,
                };
            }
        };
        self.bus.emit(StoryEvent::ClassificationComplete {
            message_id: narration.id.clone(),
            result: result.clone(),
        });

        // ── Phase 4: Applying ──────────────────────────────────────
        let apply = async { self.entries.apply(&narration.id, &result.entry_updates) };
        let (_changed, chapter) =
            tokio::join!(apply, self.chapters.maybe_create(&result.chapter_analysis));

        if self.config.mode == StoryMode::CreativeWriting {
            // Fire-and-forget; the turn does not await completion.
            let bus = self.bus.clone();
            let suggestions = Arc::clone(&self.suggestions);
            let narration_text = full_response.clone();
            let input = user_input.to_owned();
            tokio::spawn(async move {
                let list = suggestions.generate(&narration_text, &input).await;
                bus.emit(StoryEvent::SuggestionsReady { suggestions: list });
            });
        }

        TurnOutcome::Completed {
            message_id: narration.id,
            usage,
            classified: true,
            chapter_created: chapter.is_some(),
        }
    }

    /// Terminal failure: append a system story entry with a short
    /// diagnostic and return to idle.
    fn fail_turn(&self, error: Error) -> TurnOutcome {
        let message = error.to_string();
        tracing::warn!(error = %message, "turn failed");
        self.log
            .write()
            .append(StoryRole::System, &format!("The narrator is unavailable: {message}"));
        TurnOutcome::Failed { message }
    }
}
