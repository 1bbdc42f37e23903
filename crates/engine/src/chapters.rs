//! The memory/chapter engine: exclusive owner of the chapter list.
//!
//! Two jobs per turn. Before generation it decides which past chapters
//! are worth querying for the new input and answers those questions
//! concurrently. After classification it checks whether enough entries
//! have accumulated past the last boundary to close a new chapter,
//! always leaving the configured buffer of recent entries outside.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::Deserialize;

use av_domain::classification::ChapterAnalysis;
use av_domain::config::{MemoryConfig, ModelRole};
use av_domain::error::Result;
use av_domain::message::Message;
use av_domain::story::{new_id, StoryEntry, StoryRole};
use av_domain::world::Chapter;
use av_events::{EventBus, StoryEvent};
use av_providers::traits::TOOL_TEMPERATURE;
use av_providers::{ChatRequest, ModelRouter};

use crate::log::StoryLog;
use crate::util::parse_lenient;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model response schemas
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One chapter the retrieval decision wants queried.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterQuery {
    chapter_number: u32,
    question: String,
    #[serde(default)]
    priority: i32,
}

/// Scene-break analysis for chapter creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundaryAnalysis {
    /// 1-based index into the candidate entries.
    optimal_end_index: usize,
    #[serde(default)]
    suggested_title: Option<String>,
}

/// Summary document for a new chapter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryDoc {
    summary: String,
    keywords: Vec<String>,
    characters: Vec<String>,
    locations: Vec<String>,
    plot_threads: Vec<String>,
    emotional_tone: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ChapterEngine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ChapterEngine {
    chapters: RwLock<Vec<Chapter>>,
    config: MemoryConfig,
    router: Arc<ModelRouter>,
    log: Arc<RwLock<StoryLog>>,
    bus: EventBus,
}

impl ChapterEngine {
    pub fn new(
        config: MemoryConfig,
        router: Arc<ModelRouter>,
        log: Arc<RwLock<StoryLog>>,
        bus: EventBus,
    ) -> Self {
        Self {
            chapters: RwLock::new(Vec::new()),
            config,
            router,
            log,
            bus,
        }
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        self.chapters.read().clone()
    }

    pub fn count(&self) -> usize {
        self.chapters.read().len()
    }

    /// Restore a persisted chapter (import/load path).
    pub fn restore(&self, chapter: Chapter) {
        let mut chapters = self.chapters.write();
        chapters.push(chapter);
        chapters.sort_by_key(|c| c.number);
    }

    /// Sequence of the last archived entry; 0 when no chapter exists.
    pub fn last_end_seq(&self) -> u64 {
        self.chapters.read().last().map_or(0, |c| c.end_seq)
    }

    fn next_number(&self) -> u32 {
        self.chapters.read().last().map_or(1, |c| c.number + 1)
    }

    // ── Retrieval ──────────────────────────────────────────────────

    /// Decide which chapters matter for this input and answer targeted
    /// questions against them, combined in chapter order.
    ///
    /// Returns `None`, with zero provider calls, when no chapters exist
    /// or retrieval is disabled. An empty decision is a frequent, valid
    /// result.
    pub async fn retrieve(&self, user_input: &str, recent: &[StoryEntry]) -> Option<String> {
        if !self.config.enable_retrieval {
            return None;
        }
        let chapters = self.chapters.read().clone();
        if chapters.is_empty() {
            return None;
        }

        let queries = match self.decide(user_input, recent, &chapters).await {
            Ok(queries) => queries,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval decision failed, skipping retrieval");
                return None;
            }
        };
        if queries.is_empty() {
            tracing::debug!("retrieval decision selected no chapters");
            return None;
        }

        // Pair queries with existing chapters, drop lowest priority
        // beyond the cap (recency wins ties), one query per chapter.
        let mut paired: Vec<(Chapter, ChapterQuery)> = queries
            .into_iter()
            .filter_map(|q| {
                chapters
                    .iter()
                    .find(|c| c.number == q.chapter_number)
                    .cloned()
                    .map(|c| (c, q))
            })
            .collect();
        paired.sort_by(|a, b| {
            b.1.priority
                .cmp(&a.1.priority)
                .then(b.0.number.cmp(&a.0.number))
        });
        let mut seen = HashSet::new();
        paired.retain(|(c, _)| seen.insert(c.number));
        paired.truncate(self.config.max_chapters_per_retrieval);

        let answers = join_all(
            paired
                .iter()
                .map(|(chapter, query)| self.answer(chapter, &query.question)),
        )
        .await;

        let mut segments: Vec<(u32, String)> = paired
            .iter()
            .zip(answers)
            .filter_map(|((chapter, _), answer)| match answer {
                Ok(text) if !text.trim().is_empty() => Some((
                    chapter.number,
                    format!("[Chapter {}] {}", chapter.number, text.trim()),
                )),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(
                        chapter = chapter.number,
                        error = %e,
                        "chapter query failed, skipping segment"
                    );
                    None
                }
            })
            .collect();

        segments.sort_by_key(|(number, _)| *number);
        if segments.is_empty() {
            return None;
        }
        Some(
            segments
                .into_iter()
                .map(|(_, segment)| segment)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    async fn decide(
        &self,
        user_input: &str,
        recent: &[StoryEntry],
        chapters: &[Chapter],
    ) -> Result<Vec<ChapterQuery>> {
        let (provider, model) = self.router.resolve(ModelRole::Retrieval)?;

        let digest: String = chapters
            .iter()
            .map(|c| {
                format!(
                    "Chapter {} | {} | characters: {} | locations: {}",
                    c.number,
                    c.summary,
                    c.characters.join(", "),
                    c.locations.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let recent_text: String = recent
            .iter()
            .map(|e| format!("{}: {}", role_label(e.role), e.content))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Recent messages:\n{recent_text}\n\nNew player input:\n{user_input}\n\n\
             Past chapters:\n{digest}\n\n\
             Which chapters, if any, hold details needed to narrate this \
             input well? Be conservative: an empty list is usually right. \
             Respond with a JSON array of \
             {{\"chapterNumber\": n, \"question\": \"...\", \"priority\": n}} \
             and nothing else."
        );

        let req = ChatRequest {
            model: Some(model),
            messages: vec![Message::user(prompt)],
            temperature: Some(TOOL_TEMPERATURE),
            max_tokens: Some(512),
            ..Default::default()
        };

        let resp = provider.complete(&req).await?;
        parse_lenient(&resp.content)
    }

    async fn answer(&self, chapter: &Chapter, question: &str) -> Result<String> {
        let (provider, model) = self.router.resolve(ModelRole::Retrieval)?;

        let content: String = self
            .log
            .read()
            .range(chapter.start_seq, chapter.end_seq)
            .iter()
            .map(|e| e.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        // Entries may have been pruned by the persistence layer; the
        // summary still answers coarse questions.
        let content = if content.is_empty() {
            chapter.summary.clone()
        } else {
            content
        };

        let prompt = format!(
            "Chapter {} of the story:\n{content}\n\n\
             Answer this question about the chapter in two sentences or \
             fewer. If the chapter does not answer it, reply with an \
             empty string.\n\nQuestion: {question}",
            chapter.number
        );

        let req = ChatRequest {
            model: Some(model),
            messages: vec![Message::user(prompt)],
            temperature: Some(TOOL_TEMPERATURE),
            max_tokens: Some(256),
            ..Default::default()
        };

        let resp = provider.complete(&req).await?;
        Ok(resp.content)
    }

    // ── Auto-chapter creation ──────────────────────────────────────

    /// After classification: close a chapter if enough entries have
    /// accumulated (or the classifier asked for one), leaving the buffer
    /// of recent entries outside. Emits `ChapterCreated`.
    pub async fn maybe_create(&self, analysis: &ChapterAnalysis) -> Option<Chapter> {
        if !self.config.auto_summarize {
            return None;
        }

        let last_end = self.last_end_seq();
        let pending = self.log.read().since_seq(last_end);
        let accumulated = pending.len();
        let threshold = self.config.chapter_threshold;
        let buffer = self.config.chapter_buffer;

        let triggered = analysis.should_create_chapter || accumulated >= threshold + buffer;
        // The buffer is never consumed.
        let eligible = accumulated.saturating_sub(buffer);
        if !triggered || eligible == 0 {
            return None;
        }
        let candidates = &pending[..eligible];

        let (end_index, title) = match self.analyze_boundary(candidates).await {
            Ok(boundary) => (
                boundary.optimal_end_index.clamp(1, eligible),
                boundary
                    .suggested_title
                    .or_else(|| analysis.suggested_title.clone()),
            ),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "scene-break analysis failed, closing at the buffer boundary"
                );
                (eligible, analysis.suggested_title.clone())
            }
        };
        let chosen = &candidates[..end_index];

        let doc = match self.summarize(chosen).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "chapter summary failed, deferring creation");
                return None;
            }
        };

        let first = chosen.first()?;
        let last = chosen.last()?;
        let chapter = Chapter {
            id: new_id(),
            number: self.next_number(),
            start_entry_id: first.id.clone(),
            end_entry_id: last.id.clone(),
            start_seq: first.seq,
            end_seq: last.seq,
            entry_count: last.seq - first.seq + 1,
            summary: doc.summary,
            title,
            keywords: doc.keywords,
            characters: doc.characters,
            locations: doc.locations,
            plot_threads: doc.plot_threads,
            emotional_tone: doc.emotional_tone,
            arc_id: None,
        };

        self.chapters.write().push(chapter.clone());
        tracing::info!(
            number = chapter.number,
            entries = chapter.entry_count,
            "chapter created"
        );
        self.bus.emit(StoryEvent::ChapterCreated {
            chapter: chapter.clone(),
        });
        Some(chapter)
    }

    async fn analyze_boundary(&self, candidates: &[StoryEntry]) -> Result<BoundaryAnalysis> {
        let (provider, model) = self.router.resolve(ModelRole::Summarization)?;

        let numbered: String = candidates
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {}", i + 1, e.content))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "These story entries are being archived into a chapter:\n\
             {numbered}\n\n\
             Pick the entry index where the chapter should end: the most \
             natural scene break at or before {len}. Respond with JSON: \
             {{\"optimalEndIndex\": n, \"suggestedTitle\": \"...\"}}",
            len = candidates.len()
        );

        let req = ChatRequest {
            model: Some(model),
            messages: vec![Message::user(prompt)],
            temperature: Some(TOOL_TEMPERATURE),
            max_tokens: Some(128),
            ..Default::default()
        };

        let resp = provider.complete(&req).await?;
        parse_lenient(&resp.content)
    }

    async fn summarize(&self, chosen: &[StoryEntry]) -> Result<SummaryDoc> {
        let (provider, model) = self.router.resolve(ModelRole::Summarization)?;

        let content: String = chosen
            .iter()
            .map(|e| format!("{}: {}", role_label(e.role), e.content))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Summarize this chapter of an interactive story for long-term \
             memory. Capture what happened, who was involved, and any \
             open threads. Respond with JSON: {{\"summary\": \"...\", \
             \"keywords\": [], \"characters\": [], \"locations\": [], \
             \"plotThreads\": [], \"emotionalTone\": \"...\"}}\n\n{content}"
        );

        let req = ChatRequest {
            model: Some(model),
            messages: vec![Message::user(prompt)],
            temperature: Some(TOOL_TEMPERATURE),
            max_tokens: Some(1024),
            ..Default::default()
        };

        let resp = provider.complete(&req).await?;
        let mut doc: SummaryDoc = parse_lenient(&resp.content).unwrap_or_else(|_| SummaryDoc {
            summary: resp.content.trim().to_owned(),
            ..Default::default()
        });
        if doc.summary.trim().is_empty() {
            // A chapter must carry a non-empty summary.
            let mut fallback = content;
            let mut cut = fallback.len().min(500);
            while !fallback.is_char_boundary(cut) {
                cut -= 1;
            }
            fallback.truncate(cut);
            doc.summary = fallback;
        }
        Ok(doc)
    }
}

fn role_label(role: StoryRole) -> &'static str {
    match role {
        StoryRole::UserAction => "player",
        StoryRole::Narration => "narrator",
        StoryRole::System => "system",
    }
}
