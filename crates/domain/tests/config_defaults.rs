use av_domain::config::{InjectionScope, QualityTier, StoryConfig, StoryMode};

#[test]
fn defaults_match_documented_values() {
    let config = StoryConfig::default();
    assert_eq!(config.mode, StoryMode::Adventure);
    assert_eq!(config.memory.chapter_threshold, 50);
    assert_eq!(config.memory.chapter_buffer, 10);
    assert_eq!(config.memory.max_chapters_per_retrieval, 4);
    assert_eq!(config.memory.recent_window, 6);
    assert!(config.memory.enable_retrieval);
    assert_eq!(config.entries.llm_threshold, 30);
    assert_eq!(config.entries.injection_mode, InjectionScope::Auto);
    assert_eq!(config.models.quality_tier, QualityTier::Balanced);
    assert_eq!(config.event_buffer, 64);
}

#[test]
fn partial_toml_fills_in_defaults() {
    let toml_str = r#"
mode = "creative-writing"

[memory]
chapter_threshold = 5
chapter_buffer = 2

[entries]
injection_mode = "state-only"
"#;
    let config: StoryConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.mode, StoryMode::CreativeWriting);
    assert_eq!(config.memory.chapter_threshold, 5);
    assert_eq!(config.memory.chapter_buffer, 2);
    // Unspecified fields keep their defaults.
    assert!(config.memory.auto_summarize);
    assert_eq!(config.entries.injection_mode, InjectionScope::StateOnly);
    assert_eq!(config.entries.llm_threshold, 30);
}
