// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::core::types::{CritiqueFocus, DocKind};
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub debate: DebateConfig,

    #[serde(default)]
    pub retry: RetryToml,

    #[serde(default)]
    pub review: ReviewConfig,

    /// Per-model price overrides keyed by "provider/model".
    #[serde(default)]
    pub pricing: HashMap<String, PriceEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub proposer: Option<String>,
    pub arbiter: Option<String>,
    #[serde(default)]
    pub opponents: Vec<OpponentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpponentConfig {
    pub model: String,
    pub persona: Option<String>,
    pub focus: Option<CritiqueFocus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    pub doc_kind: DocKind,
    pub max_rounds: u32,
    pub min_rounds: u32,
    pub max_tokens: u32,
    pub similarity_threshold: f64,
    pub preserve_intent: bool,
    pub concurrent_opponents: bool,
    /// Free-form context appended to every round prompt.
    #[serde(default)]
    pub context: Option<String>,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            doc_kind: DocKind::TechSpec,
            max_rounds: 5,
            min_rounds: 2,
            max_tokens: 8192,
            similarity_threshold: 0.995,
            preserve_intent: false,
            concurrent_opponents: true,
            context: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryToml {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for RetryToml {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
            jitter_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub enabled: bool,
    /// Rounds granted back to the budget when a reviewer requests changes.
    pub extra_rounds: u32,
    /// Seed a tech-spec session from an approved PRD.
    pub handoff_to_tech: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_rounds: 2,
            handoff_to_tech: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceEntry {
    pub input: f64,
    pub output: f64,
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.debate.max_rounds, 5);
        assert_eq!(c.debate.min_rounds, 2);
        assert_eq!(c.debate.doc_kind, DocKind::TechSpec);
        assert!((c.debate.similarity_threshold - 0.995).abs() < 1e-9);
        assert_eq!(c.retry.max_retries, 3);
        assert!(c.review.enabled);
        assert!(c.models.opponents.is_empty());
        assert!(c.pricing.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.debate.max_rounds, 5);
        assert!(config.models.proposer.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[models]
proposer = "anthropic/claude-sonnet-4"
arbiter = "anthropic/claude-opus-4"

[[models.opponents]]
model = "openai/gpt-4.1"
persona = "security-engineer"
focus = "security"

[[models.opponents]]
model = "openai/o3-mini"

[debate]
doc_kind = "prd"
max_rounds = 8
min_rounds = 3
max_tokens = 4096
similarity_threshold = 0.95
preserve_intent = true
concurrent_opponents = false
context = "Internal payments platform"

[retry]
max_retries = 5
initial_delay_ms = 500
backoff_factor = 3.0
max_delay_ms = 10000
jitter_fraction = 0.0

[review]
enabled = false
extra_rounds = 1
handoff_to_tech = true

[pricing]
"openai/gpt-4.1" = { input = 2.0, output = 8.0 }
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.models.proposer.as_deref(),
            Some("anthropic/claude-sonnet-4")
        );
        assert_eq!(config.models.opponents.len(), 2);
        assert_eq!(
            config.models.opponents[0].focus,
            Some(CritiqueFocus::Security)
        );
        assert!(config.models.opponents[1].persona.is_none());
        assert_eq!(config.debate.doc_kind, DocKind::Prd);
        assert_eq!(config.debate.max_rounds, 8);
        assert!(config.debate.preserve_intent);
        assert!(!config.debate.concurrent_opponents);
        assert_eq!(config.retry.max_retries, 5);
        assert!(!config.review.enabled);
        assert!(config.review.handoff_to_tech);
        assert!((config.pricing["openai/gpt-4.1"].output - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_unknown_focus_rejected() {
        let toml_str = r#"
[[models.opponents]]
model = "openai/gpt-4.1"
focus = "vibes"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.debate.max_rounds, config.debate.max_rounds);
        assert_eq!(deserialized.retry.initial_delay_ms, 1_000);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }
}
