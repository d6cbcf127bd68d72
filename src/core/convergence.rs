// src/core/convergence.rs — Rubber-stamp heuristics for the agreement check
//
// These only ever block agreement. A hit is logged as a warning and recorded as
// the round reason; it never aborts the debate.

use super::types::{Round, Verdict};

/// Why an otherwise unanimous agreement was not accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum RubberStamp {
    /// Every opponent agreed without saying why.
    NoRationale,
    /// The candidate is near-identical to a revision rejected in an earlier round.
    RepeatsRejected { round: u32, similarity: f64 },
    /// Early agreement on a candidate that barely differs from the seed document.
    UnchangedFromSeed { similarity: f64 },
}

impl std::fmt::Display for RubberStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RubberStamp::NoRationale => {
                write!(f, "likely rubber-stamp: no opponent supplied a rationale")
            }
            RubberStamp::RepeatsRejected { round, similarity } => write!(
                f,
                "likely rubber-stamp: candidate is {:.1}% similar to the revision rejected in round {}",
                similarity * 100.0,
                round
            ),
            RubberStamp::UnchangedFromSeed { similarity } => write!(
                f,
                "likely rubber-stamp: early agreement on a candidate {:.1}% similar to the seed document",
                similarity * 100.0
            ),
        }
    }
}

/// Inputs to the heuristic check for one round.
pub struct StampCheck<'a> {
    pub candidate: &'a str,
    pub seed: &'a str,
    pub history: &'a [Round],
    pub verdicts: &'a [Verdict],
    pub threshold: f64,
    /// True while the round index is below the configured minimum.
    pub early: bool,
}

/// Text similarity in [0, 1], insensitive to whitespace layout.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }
    strsim::sorensen_dice(&a, &b)
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn detect_rubber_stamp(check: &StampCheck<'_>) -> Option<RubberStamp> {
    if check
        .verdicts
        .iter()
        .all(|v| v.rationale.trim().is_empty())
    {
        return Some(RubberStamp::NoRationale);
    }

    for round in check.history.iter().filter(|r| r.was_rejected()) {
        if let Some(rejected) = round.revision.as_deref() {
            let sim = similarity(check.candidate, rejected);
            if sim >= check.threshold {
                return Some(RubberStamp::RepeatsRejected {
                    round: round.index,
                    similarity: sim,
                });
            }
        }
    }

    if check.early {
        let sim = similarity(check.candidate, check.seed);
        if sim >= check.threshold {
            return Some(RubberStamp::UnchangedFromSeed { similarity: sim });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Role, RoundOutcome};

    fn verdict(rationale: &str) -> Verdict {
        Verdict {
            role: Role::Opponent(1),
            agrees: true,
            rationale: rationale.into(),
            requested_changes: vec![],
        }
    }

    fn rejected_round(index: u32, revision: &str) -> Round {
        let mut r = Round::new(index);
        r.revision = Some(revision.into());
        r.verdicts.push(Verdict {
            role: Role::Opponent(1),
            agrees: false,
            rationale: "no error handling".into(),
            requested_changes: vec![],
        });
        r
    }

    const SEED: &str = "# Payments API\n\nAccept card payments over HTTPS.";
    const REVISED: &str = "# Payments API\n\n## Goals\nAccept card and ACH payments.\n\n## Errors\nRetry 5xx with backoff, surface 4xx to the caller.";

    fn check<'a>(
        candidate: &'a str,
        history: &'a [Round],
        verdicts: &'a [Verdict],
        early: bool,
    ) -> StampCheck<'a> {
        StampCheck {
            candidate,
            seed: SEED,
            history,
            verdicts,
            threshold: 0.98,
            early,
        }
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("same text", "same  text\n"), 1.0);
        assert!(similarity(SEED, REVISED) < 0.9);
    }

    #[test]
    fn test_no_rationale_detected() {
        let verdicts = vec![verdict(""), verdict("  ")];
        assert_eq!(
            detect_rubber_stamp(&check(REVISED, &[], &verdicts, false)),
            Some(RubberStamp::NoRationale)
        );
    }

    #[test]
    fn test_one_rationale_is_enough() {
        let verdicts = vec![verdict(""), verdict("Error handling is now explicit.")];
        assert_eq!(detect_rubber_stamp(&check(REVISED, &[], &verdicts, false)), None);
    }

    #[test]
    fn test_repeat_of_rejected_revision() {
        let history = vec![rejected_round(1, REVISED)];
        let verdicts = vec![verdict("fine now")];
        let hit = detect_rubber_stamp(&check(REVISED, &history, &verdicts, false));
        assert!(matches!(hit, Some(RubberStamp::RepeatsRejected { round: 1, .. })));
    }

    #[test]
    fn test_aborted_round_revision_is_not_a_rejection() {
        let mut aborted = rejected_round(1, REVISED);
        aborted.outcome = RoundOutcome::Aborted;
        let history = vec![aborted];
        let verdicts = vec![verdict("fine now")];
        assert_eq!(detect_rubber_stamp(&check(REVISED, &history, &verdicts, false)), None);
    }

    #[test]
    fn test_heuristic_blocked_round_is_not_a_rejection() {
        let mut blocked = Round::new(0);
        blocked.revision = Some(REVISED.into());
        blocked.verdicts.push(verdict(""));
        let history = vec![blocked];
        let verdicts = vec![verdict("error handling is explicit now")];
        assert_eq!(detect_rubber_stamp(&check(REVISED, &history, &verdicts, false)), None);
    }

    #[test]
    fn test_seed_check_only_applies_early() {
        let verdicts = vec![verdict("looks good")];
        assert!(matches!(
            detect_rubber_stamp(&check(SEED, &[], &verdicts, true)),
            Some(RubberStamp::UnchangedFromSeed { .. })
        ));
        assert_eq!(detect_rubber_stamp(&check(SEED, &[], &verdicts, false)), None);
    }

    #[test]
    fn test_display_mentions_rubber_stamp() {
        let s = RubberStamp::RepeatsRejected {
            round: 2,
            similarity: 0.995,
        }
        .to_string();
        assert!(s.contains("rubber-stamp"));
        assert!(s.contains("round 2"));
    }
}
