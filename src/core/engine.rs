// src/core/engine.rs — Debate round engine
//
// One round: ProposerTurn -> OpponentTurns -> AgreementCheck -> outcome.
// The engine is the single writer of a session during a round: every turn's
// cost is accumulated on the in-flight `Round` and committed with it, then the
// session is checkpointed before the next round may start.

use std::sync::Arc;

use futures::future::join_all;

use super::convergence::{detect_rubber_stamp, StampCheck};
use super::parser::{extract_spec, parse_confirmation, parse_verdict};
use super::prompts::{Prompt, PromptBuilder};
use super::registry::ParticipantRegistry;
use super::session::Session;
use super::types::{Role, Round, RoundOutcome, SessionStatus, TurnRecord, Verdict};
use crate::infra::errors::DebateError;
use crate::infra::store::SessionStore;
use crate::provider::gateway::{CallResult, ModelGateway};
use crate::provider::retry::CancelFlag;

pub const OPERATOR_ABORT: &str = "aborted by operator";
pub const BUDGET_EXHAUSTED: &str = "round budget exhausted";

/// Position of the engine within one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    ProposerTurn,
    OpponentTurns,
    AgreementCheck,
    Continue,
    Converged,
    Escalate,
    Aborted,
}

impl EngineState {
    pub fn can_advance_to(self, next: EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, next),
            (Init, ProposerTurn)
                | (ProposerTurn, OpponentTurns)
                | (OpponentTurns, AgreementCheck)
                | (AgreementCheck, Continue | Converged | Escalate | Aborted)
                | (Init | ProposerTurn | OpponentTurns, Aborted)
                | (Continue, ProposerTurn)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EngineState::Converged | EngineState::Escalate | EngineState::Aborted
        )
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineState::Init => "init",
            EngineState::ProposerTurn => "proposer turn",
            EngineState::OpponentTurns => "opponent turns",
            EngineState::AgreementCheck => "agreement check",
            EngineState::Continue => "continue",
            EngineState::Converged => "converged",
            EngineState::Escalate => "escalate",
            EngineState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

fn advance(state: &mut EngineState, next: EngineState) -> Result<(), DebateError> {
    if !state.can_advance_to(next) {
        return Err(DebateError::InvalidTransition {
            action: format!("advance to {next}"),
            status: state.to_string(),
        });
    }
    tracing::trace!(from = %state, to = %next, "Engine transition");
    *state = next;
    Ok(())
}

/// Real-time progress notifications.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    RoundStarted {
        round: u32,
        counted: u32,
        budget: u32,
    },
    TurnCompleted {
        round: u32,
        role: Role,
        cost_usd: f64,
    },
    RubberStamp {
        round: u32,
        reason: String,
    },
    RoundFinished {
        round: u32,
        outcome: RoundOutcome,
        reason: Option<String>,
        total_cost: f64,
    },
}

pub struct DebateEngine {
    gateway: Arc<ModelGateway>,
    store: SessionStore,
    cancel: CancelFlag,
    on_progress: Option<Box<dyn Fn(DebateEvent) + Send + Sync>>,
}

impl DebateEngine {
    pub fn new(gateway: Arc<ModelGateway>, store: SessionStore) -> Self {
        Self {
            gateway,
            store,
            cancel: CancelFlag::new(),
            on_progress: None,
        }
    }

    /// Share an abort switch with the caller (e.g. a Ctrl-C handler).
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, cb: impl Fn(DebateEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn emit(&self, event: DebateEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Run rounds until one ends in anything other than `Continued`.
    pub async fn run(&self, session: &mut Session) -> Result<RoundOutcome, DebateError> {
        loop {
            let outcome = self.run_round(session).await?;
            if outcome != RoundOutcome::Continued {
                return Ok(outcome);
            }
        }
    }

    /// Stop the session for good. Any in-flight call finishes, but no further
    /// call or retry is issued.
    pub fn abort(&self, session: &mut Session, reason: &str) -> Result<(), DebateError> {
        self.cancel.cancel();
        if !session.is_terminal() {
            session.review = None;
            session.fail(reason);
            tracing::warn!(session = %session.id, "Session aborted: {}", reason);
        }
        self.store.checkpoint(session)
    }

    /// Play exactly one round, commit it and checkpoint the session.
    pub async fn run_round(&self, session: &mut Session) -> Result<RoundOutcome, DebateError> {
        if session.status != SessionStatus::Active {
            return Err(DebateError::InvalidTransition {
                action: "run a round".into(),
                status: session.status.to_string(),
            });
        }
        if self.cancel.is_cancelled() {
            self.abort(session, OPERATOR_ABORT)?;
            return Ok(RoundOutcome::Aborted);
        }
        if session.budget_exhausted() {
            return self.exhausted_without_round(session);
        }

        let registry = match ParticipantRegistry::from_participants(session.participants.clone()) {
            Ok(registry) => registry,
            Err(e) => return self.fail_session(session, e),
        };
        let prompts = PromptBuilder::new(
            session.document.kind,
            session.settings.context.clone(),
            session.settings.preserve_intent,
        )?;

        let counted_before = session.counted_rounds();
        let mut round = Round::new(session.next_round_index());
        let mut state = EngineState::Init;

        tracing::info!(
            session = %session.id,
            round = round.index,
            counted = counted_before,
            budget = session.round_budget,
            "Round started"
        );
        self.emit(DebateEvent::RoundStarted {
            round: round.index,
            counted: counted_before,
            budget: session.round_budget,
        });

        let played = self
            .play_turns(session, &registry, &prompts, &mut round, &mut state)
            .await;

        let outcome = match played {
            Ok(EngineState::Converged) => {
                advance(&mut state, EngineState::Converged)?;
                RoundOutcome::Converged
            }
            Ok(_) if counted_before + 1 >= session.round_budget => {
                if let Some(prior) = round.reason.take() {
                    tracing::info!(session = %session.id, round = round.index, "Final round did not converge: {}", prior);
                }
                round.reason = Some(BUDGET_EXHAUSTED.into());
                if session.settings.review_enabled {
                    advance(&mut state, EngineState::Escalate)?;
                    RoundOutcome::Escalated
                } else {
                    advance(&mut state, EngineState::Aborted)?;
                    session.fail(BUDGET_EXHAUSTED);
                    RoundOutcome::Aborted
                }
            }
            Ok(_) => {
                advance(&mut state, EngineState::Continue)?;
                RoundOutcome::Continued
            }
            Err(e) => return self.interrupted(session, round, state, e),
        };

        round.outcome = outcome;
        if let Some(candidate) = round.revision.clone() {
            if candidate != session.document.body {
                session.document.apply_revision(candidate);
            }
        }
        if outcome != RoundOutcome::Aborted {
            session.pending_feedback.clear();
        }
        if outcome == RoundOutcome::Converged {
            session.status = SessionStatus::Converged;
            session.reason = round.reason.clone();
        }
        self.commit(session, round)?;
        Ok(outcome)
    }

    async fn play_turns(
        &self,
        session: &Session,
        registry: &ParticipantRegistry,
        prompts: &PromptBuilder,
        round: &mut Round,
        state: &mut EngineState,
    ) -> Result<EngineState, DebateError> {
        let settings = &session.settings;
        let max_tokens = settings.max_tokens;
        let counted_before = session.counted_rounds();

        // ── Proposer turn. The arbiter drafts the opening revision.
        advance(state, EngineState::ProposerTurn)?;
        let author = if counted_before == 0 {
            registry.arbiter()
        } else {
            registry.proposer()
        };
        let prompt = prompts.proposer(
            author,
            round.index,
            &session.document.body,
            &session.carried_critiques(),
            &session.pending_feedback,
        )?;
        let call = self
            .gateway
            .invoke(author, &prompt, max_tokens, &self.cancel)
            .await?;
        self.record_turn(round, &call);
        let candidate = extract_spec(&call.text).ok_or_else(|| {
            DebateError::malformed(author.role.to_string(), "revision has no [SPEC] block")
        })?;
        round.revision = Some(candidate.clone());

        // ── Opponent turns, recorded in registration order.
        advance(state, EngineState::OpponentTurns)?;
        let opponents = registry.opponents();
        let opponent_prompts = opponents
            .iter()
            .map(|p| prompts.opponent(p, round.index, &candidate))
            .collect::<Result<Vec<Prompt>, _>>()?;
        let calls = opponents
            .iter()
            .zip(&opponent_prompts)
            .map(|(p, prompt)| self.gateway.invoke(p, prompt, max_tokens, &self.cancel));
        let results = if settings.concurrent_opponents {
            join_all(calls).await
        } else {
            let mut out = Vec::with_capacity(opponents.len());
            for call in calls {
                out.push(call.await);
            }
            out
        };

        let mut failure: Option<DebateError> = None;
        for (opponent, result) in opponents.iter().zip(results) {
            match result {
                Ok(call) => {
                    self.record_turn(round, &call);
                    let verdict = parse_verdict(&opponent.role, &call.text).unwrap_or_else(|e| {
                        tracing::warn!(role = %opponent.role, "Treating reply as disagreement: {}", e);
                        Verdict::unusable(opponent.role.clone())
                    });
                    round.verdicts.push(verdict);
                }
                Err(e @ DebateError::MalformedResponse { .. }) => {
                    tracing::warn!(role = %opponent.role, "Treating reply as disagreement: {}", e);
                    if let Some(call) = e.billed_call() {
                        self.record_turn(round, call);
                    }
                    round.verdicts.push(Verdict::unusable(opponent.role.clone()));
                }
                Err(e) => {
                    let replace = match &failure {
                        None => true,
                        Some(prev) => {
                            matches!(e, DebateError::Cancelled)
                                && !matches!(prev, DebateError::Cancelled)
                        }
                    };
                    if replace {
                        failure = Some(e);
                    }
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        // ── Agreement check.
        advance(state, EngineState::AgreementCheck)?;
        let dissent = round.verdicts.iter().filter(|v| !v.agrees).count();
        if dissent > 0 {
            round.reason = Some(format!(
                "{} of {} opponents disagreed",
                dissent,
                round.verdicts.len()
            ));
            return Ok(EngineState::Continue);
        }

        let early = counted_before + 1 < settings.min_rounds;
        let stamp = detect_rubber_stamp(&StampCheck {
            candidate: &candidate,
            seed: session.document.seed(),
            history: &session.rounds,
            verdicts: &round.verdicts,
            threshold: settings.similarity_threshold,
            early,
        });
        if let Some(hit) = stamp {
            tracing::warn!(session = %session.id, round = round.index, "{}", hit);
            self.emit(DebateEvent::RubberStamp {
                round: round.index,
                reason: hit.to_string(),
            });
            round.reason = Some(hit.to_string());
            return Ok(EngineState::Continue);
        }

        let arbiter = registry.arbiter();
        let prompt = prompts.arbiter(arbiter, round.index, &candidate, &round.verdicts, early)?;
        let call = self
            .gateway
            .invoke(arbiter, &prompt, max_tokens, &self.cancel)
            .await?;
        self.record_turn(round, &call);
        let confirmation = parse_confirmation(&call.text);
        let confirmed = confirmation.confirmed;
        round.reason = Some(if confirmed {
            "all opponents agreed and the arbiter confirmed".into()
        } else {
            "arbiter withheld confirmation".into()
        });
        round.confirmation = Some(confirmation);

        Ok(if confirmed {
            EngineState::Converged
        } else {
            EngineState::Continue
        })
    }

    fn record_turn(&self, round: &mut Round, call: &CallResult) {
        round.responses.push(TurnRecord {
            role: call.role.clone(),
            model: call.model.clone(),
            text: call.text.clone(),
            usage: call.usage,
            cost_usd: call.cost_usd,
        });
        self.emit(DebateEvent::TurnCompleted {
            round: round.index,
            role: call.role.clone(),
            cost_usd: call.cost_usd,
        });
    }

    /// A turn failed. Transport exhaustion and a malformed revision from the
    /// proposer abort the round only; cancellation and anything else end the
    /// session.
    fn interrupted(
        &self,
        session: &mut Session,
        mut round: Round,
        mut state: EngineState,
        error: DebateError,
    ) -> Result<RoundOutcome, DebateError> {
        let phase = state;
        advance(&mut state, EngineState::Aborted)?;
        round.outcome = RoundOutcome::Aborted;
        if let Some(call) = error.billed_call() {
            self.record_turn(&mut round, call);
        }

        if matches!(error, DebateError::Cancelled) {
            round.reason = Some(OPERATOR_ABORT.into());
            session.fail(OPERATOR_ABORT);
            tracing::warn!(session = %session.id, round = round.index, "Debate aborted by operator");
            self.commit(session, round)?;
            return Ok(RoundOutcome::Aborted);
        }

        // The arbiter is the trust anchor: its malformed replies are fatal even
        // when it is drafting the opening revision.
        let round_level = error.is_round_level()
            || (phase == EngineState::ProposerTurn
                && matches!(
                    &error,
                    DebateError::MalformedResponse { participant, .. }
                        if *participant != Role::Arbiter.to_string()
                ));
        round.reason = Some(format!("{phase} failed: {error}"));

        if round_level {
            tracing::warn!(
                session = %session.id,
                round = round.index,
                "Round aborted, session remains resumable: {}",
                error
            );
            self.commit(session, round)?;
            return Ok(RoundOutcome::Aborted);
        }

        session.fail(format!("{phase} failed: {error}"));
        tracing::error!(session = %session.id, round = round.index, "Session failed: {}", error);
        self.commit(session, round)?;
        Err(error)
    }

    /// Budget already spent on entry: nothing left to play.
    fn exhausted_without_round(&self, session: &mut Session) -> Result<RoundOutcome, DebateError> {
        let escalated = session
            .last_counted_round()
            .is_some_and(|r| r.outcome == RoundOutcome::Escalated);
        if session.settings.review_enabled && escalated {
            return Ok(RoundOutcome::Escalated);
        }
        session.fail(BUDGET_EXHAUSTED);
        self.store.checkpoint(session)?;
        Ok(RoundOutcome::Aborted)
    }

    fn fail_session(
        &self,
        session: &mut Session,
        error: DebateError,
    ) -> Result<RoundOutcome, DebateError> {
        session.fail(error.to_string());
        self.store.checkpoint(session)?;
        Err(error)
    }

    /// Append the round (its costs go to the ledger with it), snapshot the
    /// document and checkpoint.
    fn commit(&self, session: &mut Session, round: Round) -> Result<(), DebateError> {
        let index = round.index;
        let outcome = round.outcome;
        let reason = round.reason.clone();
        let aborted = outcome == RoundOutcome::Aborted;

        session.commit_round(round);
        if !aborted {
            if let Err(e) = self.store.write_snapshot(session, index) {
                tracing::warn!(session = %session.id, round = index, "Snapshot write failed: {}", e);
            }
        }
        self.store.checkpoint(session)?;

        tracing::info!(
            session = %session.id,
            round = index,
            outcome = %outcome,
            cost = session.ledger.total_usd(),
            "Round finished"
        );
        self.emit(DebateEvent::RoundFinished {
            round: index,
            outcome,
            reason,
            total_cost: session.ledger.total_usd(),
        });
        Ok(())
    }
}
