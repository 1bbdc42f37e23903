use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Engine roles that resolve to a provider model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    Narrator,
    Classifier,
    Retrieval,
    Summarization,
    Suggestions,
}

/// Quality/latency trade-off mapped per-role to model ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Swift,
    #[default]
    Balanced,
    Vivid,
}

/// Per-role model overrides; `None` falls back to the quality tier.
/// Specs may be `provider_id/model_name` or a bare model name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleModels {
    pub narrator: Option<String>,
    pub classifier: Option<String>,
    pub retrieval: Option<String>,
    pub summarization: Option<String>,
    pub suggestions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub quality_tier: QualityTier,
    pub overrides: RoleModels,
}

impl ModelConfig {
    /// Resolve the model spec for a role: explicit override, else the
    /// quality-tier default.
    pub fn model_for(&self, role: ModelRole) -> String {
        let override_ = match role {
            ModelRole::Narrator => &self.overrides.narrator,
            ModelRole::Classifier => &self.overrides.classifier,
            ModelRole::Retrieval => &self.overrides.retrieval,
            ModelRole::Summarization => &self.overrides.summarization,
            ModelRole::Suggestions => &self.overrides.suggestions,
        };
        override_
            .clone()
            .unwrap_or_else(|| tier_default(self.quality_tier, role).to_owned())
    }
}

/// Heavier models narrate; lighter models do structured extraction.
fn tier_default(tier: QualityTier, role: ModelRole) -> &'static str {
    match (tier, role) {
        (QualityTier::Swift, _) => "gpt-4o-mini",
        (QualityTier::Balanced, ModelRole::Narrator) => "gpt-4o",
        (QualityTier::Balanced, _) => "gpt-4o-mini",
        (QualityTier::Vivid, ModelRole::Narrator) => "gpt-4.1",
        (QualityTier::Vivid, ModelRole::Suggestions) => "gpt-4o-mini",
        (QualityTier::Vivid, _) => "gpt-4o",
    }
}
