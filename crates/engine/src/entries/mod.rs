//! The entry engine: exclusive owner of the world-model entry table.
//!
//! Selection (Phase 1) picks the entries worth injecting into the
//! narrator prompt through a tiered policy; application (Phase 4) folds
//! classifier deltas back into the table. No other component mutates
//! entries.

mod apply;
mod select;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use av_domain::config::EntryConfig;
use av_domain::world::Entry;
use av_events::EventBus;
use av_providers::ModelRouter;

use crate::world::WorldSnapshot;

pub struct EntryEngine {
    table: RwLock<HashMap<String, Entry>>,
    config: EntryConfig,
    router: Arc<ModelRouter>,
    bus: EventBus,
}

impl EntryEngine {
    pub fn new(config: EntryConfig, router: Arc<ModelRouter>, bus: EventBus) -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            config,
            router,
            bus,
        }
    }

    /// Add an entry to the table (seeding, or restoring persisted state).
    pub fn insert(&self, entry: Entry) {
        self.table.write().insert(entry.id.clone(), entry);
    }

    /// A consistent copy of the table, sorted by name for determinism.
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut entries: Vec<Entry> = self.table.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        WorldSnapshot { entries }
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.snapshot().entries
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    pub(crate) fn config(&self) -> &EntryConfig {
        &self.config
    }

    pub(crate) fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn table(&self) -> &RwLock<HashMap<String, Entry>> {
        &self.table
    }
}
