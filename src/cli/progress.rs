// src/cli/progress.rs — Terminal progress renderer for a running debate

use crate::core::engine::DebateEvent;

/// One stderr line per event. Stdout stays clean for document output.
pub fn format_event(event: &DebateEvent) -> String {
    match event {
        DebateEvent::RoundStarted {
            round,
            counted,
            budget,
        } => format!("[round {}] started ({}/{} counted)", round + 1, counted, budget),
        DebateEvent::TurnCompleted {
            round,
            role,
            cost_usd,
        } => format!("[round {}]   {:<12} ${:.4}", round + 1, role.to_string(), cost_usd),
        DebateEvent::RubberStamp { round, reason } => {
            format!("[round {}] warning: {}", round + 1, reason)
        }
        DebateEvent::RoundFinished {
            round,
            outcome,
            reason,
            total_cost,
        } => {
            let mut line = format!("[round {}] -> {:<10} (${:.4})", round + 1, outcome.to_string(), total_cost);
            if let Some(reason) = reason {
                line.push_str(&format!(" {reason}"));
            }
            line
        }
    }
}

/// Progress callback for `DebateEngine::with_progress()`.
pub fn terminal_progress() -> impl Fn(DebateEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", format_event(&event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Role, RoundOutcome};

    #[test]
    fn test_round_started_format() {
        let line = format_event(&DebateEvent::RoundStarted {
            round: 0,
            counted: 0,
            budget: 5,
        });
        assert_eq!(line, "[round 1] started (0/5 counted)");
    }

    #[test]
    fn test_turn_format() {
        let line = format_event(&DebateEvent::TurnCompleted {
            round: 2,
            role: Role::Opponent(2),
            cost_usd: 0.0125,
        });
        assert!(line.starts_with("[round 3]"));
        assert!(line.contains("opponent-2"));
        assert!(line.contains("$0.0125"));
    }

    #[test]
    fn test_round_finished_includes_reason() {
        let line = format_event(&DebateEvent::RoundFinished {
            round: 1,
            outcome: RoundOutcome::Continued,
            reason: Some("1 of 2 opponents disagreed".into()),
            total_cost: 0.2,
        });
        assert!(line.contains("continued"));
        assert!(line.contains("$0.2000"));
        assert!(line.ends_with("1 of 2 opponents disagreed"));
    }

    #[test]
    fn test_rubber_stamp_is_a_warning() {
        let line = format_event(&DebateEvent::RubberStamp {
            round: 0,
            reason: "likely rubber-stamp: no rationale".into(),
        });
        assert_eq!(line, "[round 1] warning: likely rubber-stamp: no rationale");
    }
}
