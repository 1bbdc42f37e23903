use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which selection tiers run per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InjectionScope {
    /// All tiers, with Tier 3 gated on the pool size.
    #[default]
    Auto,
    /// Inject every entry regardless of relevance.
    All,
    /// Tier 1 only (state-based and always-inject entries).
    StateOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Allow the model-assisted Tier 3 pass.
    #[serde(default = "d_true")]
    pub enable_llm_selection: bool,
    /// Candidate-pool size beyond which Tier 3 runs.
    #[serde(default = "d_30")]
    pub llm_threshold: usize,
    #[serde(default)]
    pub injection_mode: InjectionScope,
    /// Approximate token budget for injected entries.
    #[serde(default = "d_2000")]
    pub max_entry_tokens: usize,
    /// Upper bound on Tier-3 picks per turn.
    #[serde(default = "d_8")]
    pub max_llm_selected: usize,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            enable_llm_selection: true,
            llm_threshold: 30,
            injection_mode: InjectionScope::Auto,
            max_entry_tokens: 2000,
            max_llm_selected: 8,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_30() -> usize {
    30
}
fn d_2000() -> usize {
    2000
}
fn d_8() -> usize {
    8
}
