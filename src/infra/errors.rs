// src/infra/errors.rs — Error types for adversarial-spec

use thiserror::Error;

use crate::provider::gateway::CallResult;

#[derive(Error, Debug)]
pub enum DebateError {
    // Session construction (never retried)
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Gateway errors (retried with backoff)
    #[error("Transport error from '{provider}': {message}")]
    Transport {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Semantic failures (never retried)
    /// `billed` carries a reply the provider delivered (and charged for)
    /// before it failed validation.
    #[error("Malformed response from {participant}: {reason}")]
    MalformedResponse {
        participant: String,
        reason: String,
        billed: Option<Box<CallResult>>,
    },

    // Persistence
    #[error("Session '{session_id}' not found")]
    NotFound { session_id: String },

    #[error("Session '{session_id}' has corrupt state: {reason}")]
    CorruptState { session_id: String, reason: String },

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    // Lifecycle
    #[error("Cannot {action} while session is {status}")]
    InvalidTransition { action: String, status: String },

    #[error("Review token does not match the pending review")]
    InvalidReviewToken,

    #[error("Debate aborted by operator")]
    Cancelled,

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DebateError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            DebateError::Transport {
                retriable: true,
                ..
            } | DebateError::RateLimited { .. }
        )
    }

    /// Transport and rate-limit failures abort the current round only.
    pub fn is_round_level(&self) -> bool {
        matches!(
            self,
            DebateError::Transport { .. } | DebateError::RateLimited { .. }
        )
    }

    pub fn malformed(participant: impl Into<String>, reason: impl Into<String>) -> Self {
        DebateError::MalformedResponse {
            participant: participant.into(),
            reason: reason.into(),
            billed: None,
        }
    }

    /// The delivered call behind a malformed response, if any.
    pub fn billed_call(&self) -> Option<&CallResult> {
        match self {
            DebateError::MalformedResponse {
                billed: Some(call), ..
            } => Some(call),
            _ => None,
        }
    }

    pub fn corrupt(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        DebateError::CorruptState {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_retriable() {
        let err = DebateError::RateLimited {
            provider: "openai".into(),
            retry_after_ms: 0,
        };
        assert!(err.is_retriable());
        assert!(err.is_round_level());
    }

    #[test]
    fn test_non_retriable_transport_is_still_round_level() {
        let err = DebateError::Transport {
            provider: "openai".into(),
            message: "HTTP 400".into(),
            retriable: false,
        };
        assert!(!err.is_retriable());
        assert!(err.is_round_level());
    }

    #[test]
    fn test_malformed_is_neither() {
        let err = DebateError::malformed("opponent-1", "empty response");
        assert!(!err.is_retriable());
        assert!(!err.is_round_level());
        assert_eq!(
            err.to_string(),
            "Malformed response from opponent-1: empty response"
        );
    }

    #[test]
    fn test_corrupt_display() {
        let err = DebateError::corrupt("abc", "cursor 4 exceeds 3 rounds");
        assert!(err.to_string().contains("cursor 4 exceeds 3 rounds"));
    }
}
