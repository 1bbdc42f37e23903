mod entry;
mod memory;
mod models;
mod provider;

pub use entry::*;
pub use memory::*;
pub use models::*;
pub use provider::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Interaction mode for a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoryMode {
    #[default]
    Adventure,
    CreativeWriting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    pub mode: StoryMode,
    pub memory: MemoryConfig,
    pub entries: EntryConfig,
    pub models: ModelConfig,
    pub providers: Vec<ProviderConfig>,
    /// Debug ring-buffer capacity for the event bus. No functional effect.
    pub event_buffer: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            mode: StoryMode::default(),
            memory: MemoryConfig::default(),
            entries: EntryConfig::default(),
            models: ModelConfig::default(),
            providers: Vec::new(),
            event_buffer: 64,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl StoryConfig {
    /// Validate the configuration, returning all issues found.
    ///
    /// Errors make the config unusable; warnings are advisory.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.memory.chapter_threshold < 1 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "memory.chapter_threshold".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.entries.llm_threshold == 0 && self.entries.enable_llm_selection {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "entries.llm_threshold".into(),
                message: "threshold 0 makes every turn pay a selection model call".into(),
            });
        }
        if self.entries.max_entry_tokens == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "entries.max_entry_tokens".into(),
                message: "token budget must be non-zero".into(),
            });
        }
        if self.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "providers".into(),
                message: "no providers configured; turns will fail until one is added".into(),
            });
        }
        for p in &self.providers {
            if p.base_url.is_empty() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("providers.{}.base_url", p.id),
                    message: "must not be empty".into(),
                });
            }
        }

        issues
    }

    /// Whether validation found any hard errors.
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error)
    }
}
