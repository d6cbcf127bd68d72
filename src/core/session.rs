// src/core/session.rs — Session aggregate root
//
// A session is passed explicitly to the engine and the store. Nothing here
// persists itself; durability is the store's `checkpoint`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cost::CostLedger;
use super::review::ReviewToken;
use super::types::{Document, Participant, Round, SessionStatus};
use crate::infra::config::Config;

/// Per-session debate settings, frozen at construction so a resumed session
/// behaves the same regardless of later config edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub max_rounds: u32,
    pub min_rounds: u32,
    pub max_tokens: u32,
    pub similarity_threshold: f64,
    pub preserve_intent: bool,
    pub concurrent_opponents: bool,
    pub context: Option<String>,
    pub review_enabled: bool,
    pub extra_rounds: u32,
    pub handoff_to_tech: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_rounds: config.debate.max_rounds,
            min_rounds: config.debate.min_rounds,
            max_tokens: config.debate.max_tokens,
            similarity_threshold: config.debate.similarity_threshold,
            preserve_intent: config.debate.preserve_intent,
            concurrent_opponents: config.debate.concurrent_opponents,
            context: config.debate.context.clone(),
            review_enabled: config.review.enabled,
            extra_rounds: config.review.extra_rounds,
            handoff_to_tech: config.review.handoff_to_tech,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub document: Document,
    pub participants: Vec<Participant>,
    pub rounds: Vec<Round>,
    pub status: SessionStatus,
    pub ledger: CostLedger,
    /// Number of rounds durably persisted. Never exceeds `rounds.len()`.
    pub checkpoint_cursor: usize,
    /// Counted (non-aborted) rounds allowed before the debate must stop.
    pub round_budget: u32,
    pub settings: SessionSettings,
    /// Human feedback not yet folded into a proposer turn.
    #[serde(default)]
    pub pending_feedback: Vec<String>,
    #[serde(default)]
    pub review: Option<ReviewToken>,
    /// Human-readable reason for the current terminal or failed status.
    #[serde(default)]
    pub reason: Option<String>,
    /// The PRD session this one was handed off from.
    #[serde(default)]
    pub parent_session: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        document: Document,
        participants: Vec<Participant>,
        settings: SessionSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            document,
            participants,
            rounds: Vec::new(),
            status: SessionStatus::Active,
            ledger: CostLedger::new(),
            checkpoint_cursor: 0,
            round_budget: settings.max_rounds,
            settings,
            pending_feedback: Vec::new(),
            review: None,
            reason: None,
            parent_session: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Rounds that count toward the budget.
    pub fn counted_rounds(&self) -> u32 {
        self.rounds.iter().filter(|r| r.counts_toward_budget()).count() as u32
    }

    pub fn budget_exhausted(&self) -> bool {
        self.counted_rounds() >= self.round_budget
    }

    pub fn next_round_index(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn last_counted_round(&self) -> Option<&Round> {
        self.rounds.iter().rev().find(|r| r.counts_toward_budget())
    }

    /// Critiques from the last counted round, for the next proposer turn.
    pub fn carried_critiques(&self) -> Vec<String> {
        self.last_counted_round()
            .map(Round::critiques)
            .unwrap_or_default()
    }

    /// Appends a finished round and commits its call costs to the ledger.
    /// The only path by which rounds or costs enter a session.
    pub(crate) fn commit_round(&mut self, round: Round) {
        for turn in &round.responses {
            self.ledger.record(&turn.model, &turn.usage, turn.cost_usd);
        }
        self.rounds.push(round);
        self.touch();
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.reason = Some(reason.into());
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Failed | SessionStatus::Completed
        )
    }

    /// One-line human summary, used for notifications and listings.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Session {} ({}) is {} after {} round(s), document v{}, cost {}",
            self.id,
            self.document.kind.slug(),
            self.status,
            self.rounds.len(),
            self.document.version,
            self.ledger.summary()
        );
        if let Some(reason) = &self.reason {
            s.push_str(&format!(": {reason}"));
        }
        s
    }
}
