// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{ModelRef, TokenUsage};

// ─── Document ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocKind {
    #[serde(rename = "prd")]
    Prd,
    #[serde(rename = "tech")]
    TechSpec,
}

impl DocKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            DocKind::Prd => "Product Requirements Document",
            DocKind::TechSpec => "Technical Specification",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            DocKind::Prd => "prd",
            DocKind::TechSpec => "tech",
        }
    }
}

impl std::str::FromStr for DocKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prd" => Ok(DocKind::Prd),
            "tech" | "techspec" | "tech-spec" => Ok(DocKind::TechSpec),
            other => Err(format!("unknown document kind '{other}' (expected prd or tech)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub version: u32,
    pub body: String,
}

/// The artifact under refinement. Only the engine applies revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub kind: DocKind,
    pub body: String,
    pub version: u32,
    /// Prior bodies, oldest first. Append-only.
    #[serde(default)]
    pub history: Vec<DocumentVersion>,
}

impl Document {
    pub fn new(kind: DocKind, body: impl Into<String>) -> Self {
        Self {
            kind,
            body: body.into(),
            version: 1,
            history: Vec::new(),
        }
    }

    /// Text the debate started from.
    pub fn seed(&self) -> &str {
        self.history
            .first()
            .map(|v| v.body.as_str())
            .unwrap_or(&self.body)
    }

    pub(crate) fn apply_revision(&mut self, body: String) {
        let previous = std::mem::replace(&mut self.body, body);
        self.history.push(DocumentVersion {
            version: self.version,
            body: previous,
        });
        self.version += 1;
    }

    /// History versions must strictly increase and precede the current version.
    pub fn history_is_monotonic(&self) -> bool {
        let mut last = 0;
        for entry in &self.history {
            if entry.version <= last {
                return false;
            }
            last = entry.version;
        }
        last < self.version
    }
}

// ─── Participants ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Proposer,
    /// 1-based registration index.
    Opponent(u32),
    Arbiter,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Proposer => write!(f, "proposer"),
            Role::Opponent(i) => write!(f, "opponent-{i}"),
            Role::Arbiter => write!(f, "arbiter"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CritiqueFocus {
    Security,
    Scalability,
    Performance,
    Ux,
    Reliability,
    Cost,
}

impl CritiqueFocus {
    pub const ALL: [CritiqueFocus; 6] = [
        CritiqueFocus::Security,
        CritiqueFocus::Scalability,
        CritiqueFocus::Performance,
        CritiqueFocus::Ux,
        CritiqueFocus::Reliability,
        CritiqueFocus::Cost,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CritiqueFocus::Security => "security",
            CritiqueFocus::Scalability => "scalability",
            CritiqueFocus::Performance => "performance",
            CritiqueFocus::Ux => "ux",
            CritiqueFocus::Reliability => "reliability",
            CritiqueFocus::Cost => "cost",
        }
    }
}

impl std::str::FromStr for CritiqueFocus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CritiqueFocus::ALL
            .into_iter()
            .find(|f| f.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown focus area '{s}'"))
    }
}

/// A configured debate actor. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub role: Role,
    pub model: ModelRef,
    pub persona: Option<String>,
    pub focus: Option<CritiqueFocus>,
}

impl Participant {
    pub fn new(role: Role, model: ModelRef) -> Self {
        Self {
            role,
            model,
            persona: None,
            focus: None,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_focus(mut self, focus: CritiqueFocus) -> Self {
        self.focus = Some(focus);
        self
    }
}

// ─── Rounds ─────────────────────────────────────────────────────

/// One participant's reply within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: Role,
    pub model: ModelRef,
    pub text: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
}

/// An opponent's structured reaction to the candidate revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub role: Role,
    pub agrees: bool,
    pub rationale: String,
    #[serde(default)]
    pub requested_changes: Vec<String>,
}

impl Verdict {
    pub fn unusable(role: Role) -> Self {
        Self {
            role,
            agrees: false,
            rationale: "response unusable".into(),
            requested_changes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbiterConfirmation {
    pub confirmed: bool,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Continued,
    Converged,
    Escalated,
    Aborted,
}

impl std::fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundOutcome::Continued => write!(f, "continued"),
            RoundOutcome::Converged => write!(f, "converged"),
            RoundOutcome::Escalated => write!(f, "escalated"),
            RoundOutcome::Aborted => write!(f, "aborted"),
        }
    }
}

/// One full cycle of turns. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub index: u32,
    pub responses: Vec<TurnRecord>,
    pub revision: Option<String>,
    /// Ordered by opponent registration, regardless of completion order.
    pub verdicts: Vec<Verdict>,
    pub confirmation: Option<ArbiterConfirmation>,
    pub outcome: RoundOutcome,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Round {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            responses: Vec::new(),
            revision: None,
            verdicts: Vec::new(),
            confirmation: None,
            outcome: RoundOutcome::Continued,
            reason: None,
            created_at: Utc::now(),
        }
    }

    /// Aborted rounds never count toward the round budget.
    pub fn counts_toward_budget(&self) -> bool {
        self.outcome != RoundOutcome::Aborted
    }

    pub fn cost_usd(&self) -> f64 {
        self.responses.iter().map(|r| r.cost_usd).sum()
    }

    /// The revision was turned down on its merits: an opponent disagreed or
    /// the arbiter withheld confirmation. Rounds continued by a rubber-stamp
    /// hit are not rejections.
    pub fn was_rejected(&self) -> bool {
        self.outcome == RoundOutcome::Continued
            && (self.verdicts.iter().any(|v| !v.agrees)
                || self.confirmation.as_ref().is_some_and(|c| !c.confirmed))
    }

    /// Critiques to fold into the next proposer turn.
    pub fn critiques(&self) -> Vec<String> {
        let mut out = Vec::new();
        for v in self.verdicts.iter().filter(|v| !v.agrees) {
            let mut text = format!("{}: {}", v.role, v.rationale);
            for change in &v.requested_changes {
                text.push_str("\n- ");
                text.push_str(change);
            }
            out.push(text);
        }
        if let Some(c) = self.confirmation.as_ref().filter(|c| !c.confirmed) {
            out.push(format!("{}: {}", Role::Arbiter, c.rationale));
        }
        out
    }
}

// ─── Session status ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    AwaitingReview,
    Converged,
    Failed,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::AwaitingReview => write!(f, "awaiting-review"),
            SessionStatus::Converged => write!(f, "converged"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}
