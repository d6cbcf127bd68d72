// src/provider/resolver.rs — Transport discovery from environment credentials

use std::sync::Arc;

use super::anthropic::AnthropicTransport;
use super::gateway::ModelGateway;
use super::openai::OpenAITransport;
use super::ModelTransport;
use crate::core::types::Participant;
use crate::infra::errors::DebateError;

/// OpenAI-compatible endpoints: (provider id, env var, base url).
const COMPATIBLE: &[(&str, &str, &str)] = &[
    ("groq", "GROQ_API_KEY", "https://api.groq.com/openai/v1"),
    ("openrouter", "OPENROUTER_API_KEY", "https://openrouter.ai/api/v1"),
    ("deepseek", "DEEPSEEK_API_KEY", "https://api.deepseek.com/v1"),
    ("xai", "XAI_API_KEY", "https://api.x.ai/v1"),
];

/// Every provider a transport can be discovered for: (id, display name, env var).
pub const KNOWN_PROVIDERS: &[(&str, &str, &str)] = &[
    ("anthropic", "Anthropic", "ANTHROPIC_API_KEY"),
    ("openai", "OpenAI", "OPENAI_API_KEY"),
    ("groq", "Groq", "GROQ_API_KEY"),
    ("openrouter", "OpenRouter", "OPENROUTER_API_KEY"),
    ("deepseek", "DeepSeek", "DEEPSEEK_API_KEY"),
    ("xai", "xAI", "XAI_API_KEY"),
];

/// Whether a known provider has usable credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub env_var: &'static str,
    pub configured: bool,
}

pub fn provider_status() -> Vec<ProviderStatus> {
    provider_status_with(|name| std::env::var(name).ok())
}

/// Status of every known provider, judged by what discovery would build.
pub fn provider_status_with(lookup: impl Fn(&str) -> Option<String>) -> Vec<ProviderStatus> {
    let discovered = discover_with(lookup);
    KNOWN_PROVIDERS
        .iter()
        .map(|&(id, name, env_var)| ProviderStatus {
            id,
            name,
            env_var,
            configured: discovered.iter().any(|t| t.id() == id),
        })
        .collect()
}

/// Discover transports for every provider with credentials in the environment.
pub fn discover_transports() -> Vec<Arc<dyn ModelTransport>> {
    discover_with(|name| std::env::var(name).ok())
}

/// Same as `discover_transports`, reading variables through `lookup`.
pub fn discover_with(lookup: impl Fn(&str) -> Option<String>) -> Vec<Arc<dyn ModelTransport>> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut transports: Vec<Arc<dyn ModelTransport>> = Vec::new();

    if let Some(key) = get("ANTHROPIC_API_KEY") {
        transports.push(Arc::new(AnthropicTransport::new(key)));
    }

    if let Some(key) = get("OPENAI_API_KEY") {
        let transport = match get("OPENAI_BASE_URL") {
            Some(base) => OpenAITransport::with_base_url(key, base),
            None => OpenAITransport::new(key),
        };
        transports.push(Arc::new(transport));
    }

    for &(id, env_var, base_url) in COMPATIBLE {
        if let Some(key) = get(env_var) {
            transports.push(Arc::new(OpenAITransport::compatible(
                id,
                key,
                base_url.to_string(),
            )));
        }
    }

    let ids: Vec<&str> = transports.iter().map(|t| t.id()).collect();
    tracing::debug!("Discovered transports: {:?}", ids);
    transports
}

/// Fail fast when a participant's provider has no transport.
pub fn ensure_transports(
    participants: &[Participant],
    gateway: &ModelGateway,
) -> Result<(), DebateError> {
    let mut missing: Vec<String> = participants
        .iter()
        .filter(|p| !gateway.supports(&p.model.provider))
        .map(|p| format!("{} ({})", p.role, p.model))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    Err(DebateError::Configuration(format!(
        "no credentials for the provider of: {}. Set the provider's API key environment variable",
        missing.join(", ")
    )))
}
