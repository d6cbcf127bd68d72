// src/provider/mod.rs — Model provider layer

pub mod anthropic;
pub mod gateway;
pub mod openai;
pub mod pricing;
pub mod resolver;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::errors::DebateError;

/// Capability every vendor adapter implements. The gateway never branches on
/// vendor name; it looks transports up by `id()`.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    fn id(&self) -> &str;

    /// Send one prompt and return the raw reply. Errors must be one of
    /// `Transport`, `RateLimited` or `MalformedResponse`.
    async fn send(&self, request: TransportRequest) -> Result<TransportReply, DebateError>;
}

#[derive(Debug, Clone, Default)]
pub struct TransportRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TransportReply {
    pub text: String,
    pub usage: TokenUsage,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Why the provider stopped generating. `MaxTokens` is the truncation sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    #[default]
    Unknown,
}

/// Map a failed request (no HTTP status) to a transport error.
pub(crate) fn request_error(provider: &str, e: &reqwest::Error) -> DebateError {
    DebateError::Transport {
        provider: provider.into(),
        message: e.to_string(),
        retriable: e.is_timeout() || e.is_connect() || e.is_request(),
    }
}

/// Map HTTP status failures: 429 to `RateLimited` honouring `retry-after`
/// (seconds), 5xx to retriable and other 4xx to non-retriable transport errors.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, DebateError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        return Err(DebateError::RateLimited {
            provider: provider.into(),
            retry_after_ms: retry_after_secs * 1000,
        });
    }

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(DebateError::Transport {
            provider: provider.into(),
            message: format!("HTTP {}: {}", status, error_body),
            retriable: status.is_server_error(),
        });
    }

    Ok(response)
}

/// Reference to a specific model on a specific provider.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parse "provider/model" format
    pub fn parse(s: &str) -> Option<Self> {
        let (provider, model) = s.split_once('/')?;
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}
