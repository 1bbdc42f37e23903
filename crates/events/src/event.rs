use serde::Serialize;

use av_domain::classification::ClassificationResult;
use av_domain::config::StoryMode;
use av_domain::suggestion::Suggestion;
use av_domain::world::{Chapter, Entry};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event union
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of events the core emits. An unknown tag is a
/// programming error, not a runtime condition: consumers match on this
/// enum exhaustively.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryEvent {
    /// A user action was accepted and appended to the story log.
    UserInput { content: String, mode: StoryMode },

    /// Phase 1 settled: retrieval and entry selection are done.
    ContextReady {
        retrieved_context: Option<String>,
        selected_entry_ids: Vec<String>,
    },

    /// One narrator chunk arrived.
    ResponseStreaming { chunk: String, accumulated: String },

    /// The rolling buffer yielded a completed sentence.
    SentenceComplete { text: String },

    /// The narration entry was appended.
    NarrativeResponse { message_id: String, content: String },

    /// Classification finished for a narration entry.
    ClassificationComplete {
        message_id: String,
        result: ClassificationResult,
    },

    /// Creative-mode follow-ups are available.
    SuggestionsReady { suggestions: Vec<Suggestion> },

    /// The entry engine applied deltas; carries the changed entries.
    StateUpdated { entries: Vec<Entry> },

    /// A chapter was created.
    ChapterCreated { chapter: Chapter },

    /// The persistence collaborator finished writing.
    SaveComplete,

    /// A subscriber panicked during delivery. Reported here so failures
    /// never halt delivery to other subscribers.
    HandlerError { kind: EventKind, message: String },
}

/// Discriminator for [`StoryEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UserInput,
    ContextReady,
    ResponseStreaming,
    SentenceComplete,
    NarrativeResponse,
    ClassificationComplete,
    SuggestionsReady,
    StateUpdated,
    ChapterCreated,
    SaveComplete,
    HandlerError,
}

impl StoryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StoryEvent::UserInput { .. } => EventKind::UserInput,
            StoryEvent::ContextReady { .. } => EventKind::ContextReady,
            StoryEvent::ResponseStreaming { .. } => EventKind::ResponseStreaming,
            StoryEvent::SentenceComplete { .. } => EventKind::SentenceComplete,
            StoryEvent::NarrativeResponse { .. } => EventKind::NarrativeResponse,
            StoryEvent::ClassificationComplete { .. } => EventKind::ClassificationComplete,
            StoryEvent::SuggestionsReady { .. } => EventKind::SuggestionsReady,
            StoryEvent::StateUpdated { .. } => EventKind::StateUpdated,
            StoryEvent::ChapterCreated { .. } => EventKind::ChapterCreated,
            StoryEvent::SaveComplete => EventKind::SaveComplete,
            StoryEvent::HandlerError { .. } => EventKind::HandlerError,
        }
    }
}
