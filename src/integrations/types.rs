// src/integrations/types.rs — Human feedback channel trait

use async_trait::async_trait;

use crate::core::review::{ReviewDecision, ReviewToken};
use crate::infra::errors::DebateError;

/// Delivers review requests to a human and collects their decision.
/// Only the review gate talks to a channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackChannel: Send + Sync {
    async fn notify(&self, session_id: &str, summary: &str) -> Result<(), DebateError>;

    /// Wait for the reviewer's decision on `token`. No timeout by default.
    async fn await_decision(&self, token: &ReviewToken) -> Result<ReviewDecision, DebateError>;
}

/// Interpret a free-text reply. `approve`, `lgtm` and `ok` approve; any other
/// non-empty text is a change request carrying that text.
pub fn decision_from_reply(reply: &str) -> Option<ReviewDecision> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return None;
    }
    let word = trimmed
        .trim_end_matches(['.', '!'])
        .to_ascii_lowercase();
    match word.as_str() {
        "approve" | "approved" | "lgtm" | "ok" => Some(ReviewDecision::Approve),
        _ => Some(ReviewDecision::RequestChanges {
            feedback: trimmed.to_string(),
        }),
    }
}

/// Logs notifications only. Decisions must arrive out of band through
/// `adversarial-spec review`.
pub struct LogChannel;

#[async_trait]
impl FeedbackChannel for LogChannel {
    async fn notify(&self, session_id: &str, summary: &str) -> Result<(), DebateError> {
        let headline = summary.lines().next().unwrap_or_default();
        tracing::info!(session = session_id, "{}", headline);
        Ok(())
    }

    async fn await_decision(&self, token: &ReviewToken) -> Result<ReviewDecision, DebateError> {
        Err(DebateError::Configuration(format!(
            "no interactive feedback channel configured; resolve session {} with `adversarial-spec review`",
            token.session_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_from_reply_approvals() {
        for reply in ["approve", "LGTM", " ok ", "Approved!"] {
            assert_eq!(decision_from_reply(reply), Some(ReviewDecision::Approve), "{reply}");
        }
    }

    #[test]
    fn test_decision_from_reply_change_request() {
        assert_eq!(
            decision_from_reply("ok but add a rollback plan"),
            Some(ReviewDecision::RequestChanges {
                feedback: "ok but add a rollback plan".into()
            })
        );
        assert_eq!(decision_from_reply("   "), None);
    }

    #[tokio::test]
    async fn test_log_channel_never_decides() {
        let token = ReviewToken {
            session_id: "s".into(),
            token: "t".into(),
            round_index: 0,
        };
        assert!(LogChannel.notify("s", "hello\nworld").await.is_ok());
        assert!(LogChannel.await_decision(&token).await.is_err());
    }
}
