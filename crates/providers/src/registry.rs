//! Provider registry and role-based model routing.
//!
//! The registry constructs and holds all configured provider instances;
//! initialization failures are recorded (with secrets masked) rather than
//! aborting startup. The [`ModelRouter`] resolves an engine role
//! (narrator, classifier, retrieval, summarization, suggestions) to a
//! `(provider, model)` pair from the model config.

use std::collections::HashMap;
use std::sync::Arc;

use av_domain::config::{ModelConfig, ModelRole, ProviderConfig};
use av_domain::error::{Error, Result};

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated LLM providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    /// The first successfully registered provider; used for bare model
    /// specs that carry no `provider_id/` prefix.
    default_id: Option<String>,
    /// Provider ids that failed to initialize, with masked errors.
    init_errors: Vec<ProviderInitError>,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    /// Error message with any potential secrets masked.
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message, so raw secrets never leak into logs or consumer surfaces.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_owned();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..]);
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    /// Build the registry from the configured provider endpoints.
    ///
    /// Auth keys are resolved eagerly (env vars are read at this point).
    /// Providers that fail to initialize are logged and recorded rather
    /// than aborting startup.
    pub fn from_configs(configs: &[ProviderConfig]) -> Self {
        let mut registry = Self::empty();

        for pc in configs {
            match OpenAiCompatProvider::from_config(pc) {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, "registered LLM provider");
                    registry.register(Arc::new(provider));
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %pc.id,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    registry.init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        error: safe_error,
                    });
                }
            }
        }

        registry
    }

    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            default_id: None,
            init_errors: Vec::new(),
        }
    }

    /// Register an already-constructed provider (used by tests to plug
    /// in doubles).
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        let id = provider.provider_id().to_owned();
        if self.default_id.is_none() {
            self.default_id = Some(id.clone());
        }
        self.providers.insert(id, provider);
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// The provider used for bare model specs.
    pub fn default_provider(&self) -> Option<Arc<dyn LlmProvider>> {
        self.default_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider initialization errors (empty if all succeeded).
    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ModelRouter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolves an engine role to a `(provider, model)` pair.
pub struct ModelRouter {
    registry: Arc<ProviderRegistry>,
    models: ModelConfig,
}

impl ModelRouter {
    pub fn new(registry: Arc<ProviderRegistry>, models: ModelConfig) -> Self {
        Self { registry, models }
    }

    /// Resolve a role's model spec. A `provider_id/model_name` spec picks
    /// that provider; a bare model name uses the default provider.
    pub fn resolve(&self, role: ModelRole) -> Result<(Arc<dyn LlmProvider>, String)> {
        let spec = self.models.model_for(role);

        if let Some((provider_id, model)) = spec.split_once('/') {
            if let Some(provider) = self.registry.get(provider_id) {
                return Ok((provider, model.to_owned()));
            }
        }

        let provider = self.registry.default_provider().ok_or_else(|| {
            Error::Config(
                "no LLM provider configured; add one or check credentials".into(),
            )
        })?;
        Ok((provider, spec))
    }
}
