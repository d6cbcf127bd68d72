// src/cli/run.rs — `start` and `resume`: drive a session through the engine

use std::sync::Arc;

use super::{exit_code, feedback_channel, StartArgs, EXIT_AWAITING_REVIEW, EXIT_FAILED};
use crate::core::engine::DebateEngine;
use crate::core::registry::ParticipantRegistry;
use crate::core::review::ReviewGate;
use crate::core::session::{Session, SessionSettings};
use crate::core::types::{Document, RoundOutcome, SessionStatus};
use crate::infra::config::Config;
use crate::infra::documents;
use crate::infra::store::SessionStore;
use crate::provider::gateway::ModelGateway;
use crate::provider::pricing::PriceTable;
use crate::provider::resolver;
use crate::provider::retry::{CancelFlag, RetryConfig};

/// Fold command-line flags into the loaded config.
pub fn apply_overrides(config: &mut Config, args: &StartArgs) {
    if let Some(kind) = args.kind {
        config.debate.doc_kind = kind;
    }
    if let Some(rounds) = args.rounds {
        config.debate.max_rounds = rounds;
    }
    if let Some(min_rounds) = args.min_rounds {
        config.debate.min_rounds = min_rounds;
    }
    if args.preserve_intent {
        config.debate.preserve_intent = true;
    }
    if args.no_review {
        config.review.enabled = false;
    }
    if args.sequential {
        config.debate.concurrent_opponents = false;
    }
    if let Some(ref context) = args.context {
        config.debate.context = Some(context.clone());
    }
    for opponent in &mut config.models.opponents {
        if opponent.focus.is_none() {
            opponent.focus = args.focus;
        }
        if opponent.persona.is_none() {
            opponent.persona = args.persona.clone();
        }
    }
}

pub async fn run_start(
    mut config: Config,
    args: StartArgs,
    store: SessionStore,
    quiet: bool,
) -> anyhow::Result<i32> {
    apply_overrides(&mut config, &args);

    let registry = ParticipantRegistry::from_config(&config.models)?;
    for warning in registry.warnings() {
        eprintln!("[config] warning: {warning}");
    }
    let body = documents::load(&args.doc)?;
    let mut session = Session::new(
        Document::new(config.debate.doc_kind, body),
        registry.into_participants(),
        SessionSettings::from_config(&config),
    );
    store.checkpoint(&mut session)?;

    if !quiet {
        eprintln!(
            "[session] {} | {} | {} participant(s), budget {} round(s)",
            session.id,
            session.document.kind.display_name(),
            session.participants.len(),
            session.round_budget
        );
    }
    drive(&mut session, &config, &store, quiet).await
}

pub async fn run_resume(
    config: Config,
    id: &str,
    store: SessionStore,
    quiet: bool,
) -> anyhow::Result<i32> {
    let mut session = store.load(id)?;
    match session.status {
        SessionStatus::Active => {
            if !quiet {
                eprintln!(
                    "[session] resuming {} at round {} ({}/{} counted)",
                    session.id,
                    session.next_round_index() + 1,
                    session.counted_rounds(),
                    session.round_budget
                );
            }
            drive(&mut session, &config, &store, quiet).await
        }
        SessionStatus::Converged if session.settings.review_enabled => {
            submit(&mut session, &store).await
        }
        SessionStatus::AwaitingReview => {
            eprintln!(
                "Session {} is awaiting review: adversarial-spec review {} --approve | --request-changes <text>",
                session.id, session.id
            );
            Ok(EXIT_AWAITING_REVIEW)
        }
        _ => {
            eprintln!("{}", session.summary());
            Ok(exit_code(session.status))
        }
    }
}

/// Run the engine to a stopping point and hand the session to review if
/// the outcome calls for it.
pub async fn drive(
    session: &mut Session,
    config: &Config,
    store: &SessionStore,
    quiet: bool,
) -> anyhow::Result<i32> {
    let gateway = ModelGateway::new(resolver::discover_transports())
        .with_retry_config(RetryConfig::from(&config.retry))
        .with_prices(PriceTable::new(config.pricing.clone()));
    resolver::ensure_transports(&session.participants, &gateway)?;

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n[abort] stopping after the in-flight call...");
                cancel.cancel();
            }
        });
    }

    let mut engine = DebateEngine::new(Arc::new(gateway), store.clone()).with_cancel(cancel);
    if !quiet {
        engine = engine.with_progress(super::progress::terminal_progress());
    }

    let outcome = match engine.run(session).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("{}", session.summary());
            return Ok(EXIT_FAILED);
        }
    };

    if !quiet {
        eprintln!("[cost] {}", session.ledger.summary());
    }

    match outcome {
        RoundOutcome::Converged | RoundOutcome::Escalated if session.settings.review_enabled => {
            submit(session, store).await
        }
        RoundOutcome::Converged => {
            println!("{}", session.document.body);
            Ok(exit_code(session.status))
        }
        RoundOutcome::Aborted if session.status == SessionStatus::Active => {
            eprintln!(
                "Round aborted; the session is resumable: adversarial-spec resume {}",
                session.id
            );
            Ok(EXIT_FAILED)
        }
        _ => {
            eprintln!("{}", session.summary());
            Ok(exit_code(session.status))
        }
    }
}

async fn submit(session: &mut Session, store: &SessionStore) -> anyhow::Result<i32> {
    let gate = ReviewGate::new(feedback_channel());
    gate.submit_for_review(session).await?;
    store.checkpoint(session)?;
    eprintln!(
        "Awaiting review: adversarial-spec review {} --approve | --request-changes <text> | --wait",
        session.id
    );
    Ok(EXIT_AWAITING_REVIEW)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CritiqueFocus;
    use crate::infra::config::OpponentConfig;

    fn args() -> StartArgs {
        StartArgs {
            doc: "doc.md".into(),
            kind: None,
            rounds: Some(7),
            min_rounds: None,
            focus: Some(CritiqueFocus::Cost),
            persona: Some("qa-engineer".into()),
            preserve_intent: true,
            no_review: true,
            context: None,
            sequential: true,
        }
    }

    #[test]
    fn test_overrides_apply_flags() {
        let mut config = Config::default();
        apply_overrides(&mut config, &args());
        assert_eq!(config.debate.max_rounds, 7);
        assert_eq!(config.debate.min_rounds, 2);
        assert!(config.debate.preserve_intent);
        assert!(!config.review.enabled);
        assert!(!config.debate.concurrent_opponents);
    }

    #[test]
    fn test_overrides_keep_configured_opponent_settings() {
        let mut config = Config::default();
        config.models.opponents = vec![
            OpponentConfig {
                model: "openai/gpt-4.1".into(),
                persona: Some("security-engineer".into()),
                focus: Some(CritiqueFocus::Security),
            },
            OpponentConfig {
                model: "openai/o3-mini".into(),
                persona: None,
                focus: None,
            },
        ];
        apply_overrides(&mut config, &args());
        assert_eq!(config.models.opponents[0].focus, Some(CritiqueFocus::Security));
        assert_eq!(config.models.opponents[0].persona.as_deref(), Some("security-engineer"));
        assert_eq!(config.models.opponents[1].focus, Some(CritiqueFocus::Cost));
        assert_eq!(config.models.opponents[1].persona.as_deref(), Some("qa-engineer"));
    }
}
