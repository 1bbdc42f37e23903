//! Session assembly: wires config, providers, bus, and engines into one
//! ready-to-run story session.

use std::sync::Arc;

use parking_lot::RwLock;

use av_domain::config::StoryConfig;
use av_domain::error::Result;
use av_domain::story::{StoryEntry, StoryRole};
use av_domain::world::{Chapter, Entry};
use av_events::EventBus;
use av_providers::{ModelRouter, ProviderRegistry, RetryPolicy};

use crate::chapters::ChapterEngine;
use crate::classifier::Classifier;
use crate::coordinator::{TurnCoordinator, TurnOutcome};
use crate::entries::EntryEngine;
use crate::log::StoryLog;
use crate::suggestions::SuggestionEngine;

pub struct StorySession {
    bus: EventBus,
    log: Arc<RwLock<StoryLog>>,
    entries: Arc<EntryEngine>,
    chapters: Arc<ChapterEngine>,
    coordinator: Arc<TurnCoordinator>,
}

impl StorySession {
    /// Build a session from config, instantiating providers from the
    /// config's endpoint list.
    pub fn new(config: StoryConfig) -> Self {
        let registry = Arc::new(ProviderRegistry::from_configs(&config.providers));
        Self::with_registry(config, registry)
    }

    /// Build a session against an existing registry (tests plug doubles
    /// in here).
    pub fn with_registry(config: StoryConfig, registry: Arc<ProviderRegistry>) -> Self {
        Self::with_options(config, registry, RetryPolicy::default())
    }

    pub fn with_options(
        config: StoryConfig,
        registry: Arc<ProviderRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        let bus = EventBus::with_capacity(config.event_buffer);
        let router = Arc::new(ModelRouter::new(registry, config.models.clone()));
        let log = Arc::new(RwLock::new(StoryLog::new()));
        let entries = Arc::new(EntryEngine::new(
            config.entries.clone(),
            Arc::clone(&router),
            bus.clone(),
        ));
        let chapters = Arc::new(ChapterEngine::new(
            config.memory.clone(),
            Arc::clone(&router),
            Arc::clone(&log),
            bus.clone(),
        ));
        let classifier = Classifier::new(Arc::clone(&router), retry.clone());
        let suggestions = Arc::new(SuggestionEngine::new(Arc::clone(&router)));
        let coordinator = Arc::new(TurnCoordinator::new(
            config,
            bus.clone(),
            Arc::clone(&log),
            Arc::clone(&entries),
            Arc::clone(&chapters),
            classifier,
            suggestions,
            router,
            retry,
        ));

        Self {
            bus,
            log,
            entries,
            chapters,
            coordinator,
        }
    }

    // ── Turn driving ───────────────────────────────────────────────

    /// Run one turn. See [`TurnCoordinator::submit`].
    pub async fn submit(&self, user_input: &str) -> Result<TurnOutcome> {
        self.coordinator.submit(user_input).await
    }

    pub fn cancel(&self) {
        self.coordinator.cancel();
    }

    pub fn is_busy(&self) -> bool {
        self.coordinator.is_busy()
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn coordinator(&self) -> Arc<TurnCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.entries()
    }

    pub fn chapters(&self) -> Vec<Chapter> {
        self.chapters.chapters()
    }

    pub fn story_log(&self) -> Vec<StoryEntry> {
        self.log.read().entries().to_vec()
    }

    // ── Seeding / restore ──────────────────────────────────────────

    /// Add a world entry (setup wizard or persisted-state load).
    pub fn seed_entry(&self, entry: Entry) {
        self.entries.insert(entry);
    }

    /// Restore a persisted chapter.
    pub fn seed_chapter(&self, chapter: Chapter) {
        self.chapters.restore(chapter);
    }

    /// Restore a persisted story entry. Appends at the next sequence.
    pub fn seed_story_entry(&self, role: StoryRole, content: &str) -> StoryEntry {
        self.log.write().append(role, content)
    }
}
