// src/cli/review.rs — `review` and `abort`

use super::{exit_code, feedback_channel, ReviewArgs, EXIT_OK};
use crate::core::engine::OPERATOR_ABORT;
use crate::core::review::{ReviewDecision, ReviewGate};
use crate::core::session::Session;
use crate::core::types::SessionStatus;
use crate::infra::config::Config;
use crate::infra::store::SessionStore;

/// Decision named on the command line, if any. `--wait` defers to the channel.
pub fn decision_from_args(args: &ReviewArgs) -> Option<ReviewDecision> {
    if args.approve {
        Some(ReviewDecision::Approve)
    } else {
        args.request_changes
            .as_ref()
            .map(|feedback| ReviewDecision::RequestChanges {
                feedback: feedback.clone(),
            })
    }
}

pub async fn run_review(
    config: Config,
    args: ReviewArgs,
    store: SessionStore,
    quiet: bool,
) -> anyhow::Result<i32> {
    let mut session = store.load(&args.session)?;
    let gate = ReviewGate::new(feedback_channel());

    // A converged or escalated session that never reached the gate (e.g. the
    // process died after the checkpoint) is submitted now.
    if session.status != SessionStatus::AwaitingReview {
        gate.submit_for_review(&mut session).await?;
        store.checkpoint(&mut session)?;
    }

    let (decision, handoff) = match decision_from_args(&args) {
        Some(decision) => {
            let token = session.review.clone().ok_or_else(|| {
                anyhow::anyhow!("session {} has no pending review token", session.id)
            })?;
            let handoff = gate.resolve(&mut session, &token, decision.clone())?;
            (decision, handoff)
        }
        None => {
            eprintln!("[review] waiting for a decision on session {}...", session.id);
            gate.await_and_resolve(&mut session).await?
        }
    };
    store.checkpoint(&mut session)?;

    if let Some(mut next) = handoff {
        store.checkpoint(&mut next)?;
        eprintln!(
            "[handoff] tech spec session {} seeded from the approved PRD: adversarial-spec resume {}",
            next.id, next.id
        );
    }

    match decision {
        ReviewDecision::Approve => {
            eprintln!("{}", session.summary());
            Ok(EXIT_OK)
        }
        ReviewDecision::RequestChanges { .. } => {
            eprintln!(
                "[review] changes requested; continuing the debate ({}/{} rounds used)",
                session.counted_rounds(),
                session.round_budget
            );
            super::run::drive(&mut session, &config, &store, quiet).await
        }
    }
}

/// Explicit operator abort of a stored session.
pub fn run_abort(id: &str, store: SessionStore) -> anyhow::Result<i32> {
    let mut session = store.load(id)?;
    abort_session(&mut session)?;
    store.checkpoint(&mut session)?;
    eprintln!("{}", session.summary());
    Ok(exit_code(session.status))
}

fn abort_session(session: &mut Session) -> anyhow::Result<()> {
    if session.is_terminal() {
        anyhow::bail!("session {} is already {}", session.id, session.status);
    }
    session.review = None;
    session.fail(OPERATOR_ABORT);
    tracing::warn!(session = %session.id, "Session aborted by operator");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::SessionSettings;
    use crate::core::types::{DocKind, Document};

    fn args(approve: bool, changes: Option<&str>) -> ReviewArgs {
        ReviewArgs {
            session: "s".into(),
            approve,
            request_changes: changes.map(String::from),
            wait: !approve && changes.is_none(),
        }
    }

    #[test]
    fn test_decision_from_args() {
        assert_eq!(decision_from_args(&args(true, None)), Some(ReviewDecision::Approve));
        assert_eq!(
            decision_from_args(&args(false, Some("add SLOs"))),
            Some(ReviewDecision::RequestChanges {
                feedback: "add SLOs".into()
            })
        );
        assert_eq!(decision_from_args(&args(false, None)), None);
    }

    #[test]
    fn test_abort_fails_session_once() {
        let mut s = Session::new(
            Document::new(DocKind::Prd, "# Doc"),
            vec![],
            SessionSettings::default(),
        );
        abort_session(&mut s).unwrap();
        assert_eq!(s.status, SessionStatus::Failed);
        assert_eq!(s.reason.as_deref(), Some(OPERATOR_ABORT));
        assert!(abort_session(&mut s).is_err());
    }
}
