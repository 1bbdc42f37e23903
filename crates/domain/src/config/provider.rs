use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One configured LLM provider endpoint (OpenAI-compatible wire format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique id, referenced by `provider_id/model` role specs.
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Used when a request does not name a model.
    #[serde(default)]
    pub default_model: Option<String>,
}

/// API-key resolution: a plaintext `key` (warned at startup) or the name
/// of an environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub key: Option<String>,
    pub env: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_deserializes_from_toml() {
        let toml = r#"
            id = "main"
            base_url = "https://api.example.com/v1"
            default_model = "gpt-4o-mini"

            [auth]
            env = "AVENTURA_API_KEY"
        "#;
        let cfg: ProviderConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.id, "main");
        assert_eq!(cfg.auth.env.as_deref(), Some("AVENTURA_API_KEY"));
        assert!(cfg.auth.key.is_none());
    }
}
