use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory / chapters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Long-term memory behaviour: when chapters form and how they are
/// queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Entries since the last chapter boundary before a chapter forms.
    #[serde(default = "d_50")]
    pub chapter_threshold: usize,
    /// Most-recent entries always kept outside any chapter, preserving
    /// local context for the next turn.
    #[serde(default = "d_10")]
    pub chapter_buffer: usize,
    /// Create chapter summaries automatically when thresholds are met.
    #[serde(default = "d_true")]
    pub auto_summarize: bool,
    /// Run the retrieval decision before generation.
    #[serde(default = "d_true")]
    pub enable_retrieval: bool,
    /// Upper bound on chapters queried per retrieval.
    #[serde(default = "d_4")]
    pub max_chapters_per_retrieval: usize,
    /// Group chapters into story arcs.
    #[serde(default)]
    pub enable_arcs: bool,
    /// Recent messages shown to the retrieval-decision prompt.
    #[serde(default = "d_6")]
    pub recent_window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chapter_threshold: 50,
            chapter_buffer: 10,
            auto_summarize: true,
            enable_retrieval: true,
            max_chapters_per_retrieval: 4,
            enable_arcs: false,
            recent_window: 6,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_50() -> usize {
    50
}
fn d_10() -> usize {
    10
}
fn d_6() -> usize {
    6
}
fn d_4() -> usize {
    4
}
