// src/core/review.rs — Human review gate between debate phases
//
// Suspension is an explicit session state (`awaiting-review`) plus a token,
// never a blocking call: a process can exit while a review is pending and a
// later process resolves it with the persisted token.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::Session;
use super::types::{DocKind, Document, RoundOutcome, SessionStatus};
use crate::infra::errors::DebateError;
use crate::integrations::types::FeedbackChannel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewToken {
    pub session_id: String,
    pub token: String,
    /// Round count at submission time.
    pub round_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    RequestChanges { feedback: String },
}

pub struct ReviewGate {
    channel: Arc<dyn FeedbackChannel>,
}

impl ReviewGate {
    pub fn new(channel: Arc<dyn FeedbackChannel>) -> Self {
        Self { channel }
    }

    /// Suspend the session for human review and notify the reviewer.
    /// Re-submitting a session already awaiting review returns its token.
    pub async fn submit_for_review(&self, session: &mut Session) -> Result<ReviewToken, DebateError> {
        if session.status == SessionStatus::AwaitingReview {
            if let Some(token) = &session.review {
                return Ok(token.clone());
            }
        }

        let escalated = session.status == SessionStatus::Active
            && session
                .last_counted_round()
                .is_some_and(|r| r.outcome == RoundOutcome::Escalated);
        if session.status != SessionStatus::Converged && !escalated {
            return Err(DebateError::InvalidTransition {
                action: "submit for review".into(),
                status: session.status.to_string(),
            });
        }

        let token = ReviewToken {
            session_id: session.id.clone(),
            token: Uuid::new_v4().to_string(),
            round_index: session.rounds.len() as u32,
        };
        session.status = SessionStatus::AwaitingReview;
        session.review = Some(token.clone());
        session.touch();

        tracing::info!(session = %session.id, round = token.round_index, "Awaiting review");
        if let Err(e) = self.channel.notify(&session.id, &review_summary(session)).await {
            // The token is persisted; the reviewer can still resolve via the CLI.
            tracing::warn!(session = %session.id, "Review notification failed: {}", e);
        }
        Ok(token)
    }

    /// Apply a reviewer decision. Returns the handed-off tech-spec session
    /// when an approved PRD is configured to seed one.
    pub fn resolve(
        &self,
        session: &mut Session,
        token: &ReviewToken,
        decision: ReviewDecision,
    ) -> Result<Option<Session>, DebateError> {
        if session.status != SessionStatus::AwaitingReview {
            return Err(DebateError::InvalidTransition {
                action: "resolve review".into(),
                status: session.status.to_string(),
            });
        }
        if session.review.as_ref() != Some(token) {
            return Err(DebateError::InvalidReviewToken);
        }

        session.review = None;
        match decision {
            ReviewDecision::Approve => {
                session.status = SessionStatus::Completed;
                session.reason = Some("approved by reviewer".into());
                session.touch();
                tracing::info!(session = %session.id, "Review approved");

                if session.document.kind == DocKind::Prd && session.settings.handoff_to_tech {
                    let mut next = Session::new(
                        Document::new(DocKind::TechSpec, session.document.body.clone()),
                        session.participants.clone(),
                        session.settings.clone(),
                    );
                    next.parent_session = Some(session.id.clone());
                    tracing::info!(
                        session = %session.id,
                        tech_session = %next.id,
                        "Handing approved PRD off to a tech-spec session"
                    );
                    return Ok(Some(next));
                }
                Ok(None)
            }
            ReviewDecision::RequestChanges { feedback } => {
                let feedback = feedback.trim();
                if feedback.is_empty() {
                    // Leave the review open; an empty change request carries nothing.
                    session.review = Some(token.clone());
                    return Err(DebateError::Configuration(
                        "change request feedback must not be empty".into(),
                    ));
                }
                session.pending_feedback.push(feedback.to_string());
                if session.budget_exhausted() {
                    session.round_budget =
                        session.counted_rounds() + session.settings.extra_rounds.max(1);
                }
                session.status = SessionStatus::Active;
                session.reason = None;
                session.touch();
                tracing::info!(
                    session = %session.id,
                    round_budget = session.round_budget,
                    "Reviewer requested changes"
                );
                Ok(None)
            }
        }
    }

    /// Block on the feedback channel for the pending review, then resolve it.
    pub async fn await_and_resolve(
        &self,
        session: &mut Session,
    ) -> Result<(ReviewDecision, Option<Session>), DebateError> {
        let token = session.review.clone().ok_or_else(|| DebateError::InvalidTransition {
            action: "await review".into(),
            status: session.status.to_string(),
        })?;
        let decision = self.channel.await_decision(&token).await?;
        let handoff = self.resolve(session, &token, decision.clone())?;
        Ok((decision, handoff))
    }
}

fn review_summary(session: &Session) -> String {
    let headline = match session.last_counted_round().map(|r| r.outcome) {
        Some(RoundOutcome::Escalated) => "Round budget exhausted without agreement",
        _ => "Debate converged",
    };
    let mut text = format!(
        "{headline} for {} session {}.\nRounds: {}  Version: v{}  Cost: ${:.4}\n",
        session.document.kind.display_name(),
        session.id,
        session.rounds.len(),
        session.document.version,
        session.ledger.total_usd()
    );
    if let Some(reason) = session.last_counted_round().and_then(|r| r.reason.as_deref()) {
        text.push_str(&format!("Reason: {reason}\n"));
    }
    text.push_str("\nReply \"approve\" to accept, or describe the changes you want.\n\n");
    text.push_str(&session.document.body);
    text
}
