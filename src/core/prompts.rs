// src/core/prompts.rs — Prompt construction for each debate role
//
// Wire protocol shared with the parser: `[AGREE]` on its own line signals
// agreement, a revised document sits between `[SPEC]` and `[/SPEC]`, and
// requested changes are bullet lines under a `CHANGES:` header.

use minijinja::{context, Environment};

use super::types::{CritiqueFocus, DocKind, Participant, Verdict};
use crate::infra::errors::DebateError;

/// One rendered prompt, ready for the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

pub const AGREE_MARKER: &str = "[AGREE]";
pub const SPEC_OPEN: &str = "[SPEC]";
pub const SPEC_CLOSE: &str = "[/SPEC]";
pub const CHANGES_HEADER: &str = "CHANGES:";

pub const PRESERVE_INTENT: &str = "\
**PRESERVE ORIGINAL INTENT**
This document represents deliberate design choices. Before suggesting any removal or substantial modification:
1. Assume the author had good reasons for including each element.
2. For every removal or substantial change, quote the exact text, explain the concrete problem it causes and the harm of keeping it.
3. Distinguish errors (wrong, contradictory, broken) and risks (security, scalability, missing error handling) from preferences. Do not remove preferences.
4. If something is unusual but not broken, ask about it instead of removing it.
Additions are cheap; deletions require justification.";

pub const PERSONAS: &[(&str, &str)] = &[
    ("security-engineer", "You are a senior security engineer with 15 years of experience in application security, penetration testing and secure architecture design. You think like an attacker and are paranoid about edge cases."),
    ("oncall-engineer", "You are the on-call engineer who will be paged at 3am when this system fails. You care about observability, clear error messages, runbooks and anything that helps debug production issues quickly."),
    ("junior-developer", "You are a junior developer who will implement this spec. Flag anything that is ambiguous, assumes tribal knowledge, or leaves decisions to the implementer that belong in the document."),
    ("qa-engineer", "You are a QA engineer responsible for testing this system. Identify missing test scenarios, edge cases, boundary conditions and acceptance criteria. Flag anything untestable."),
    ("site-reliability", "You are an SRE responsible for running this in production. Focus on deployment, rollback, monitoring, alerting, capacity planning and incident response."),
    ("product-manager", "You are a product manager reviewing this spec. Focus on user value, success metrics, scope clarity and whether the document solves the stated problem."),
    ("data-engineer", "You are a data engineer. Focus on data models, data flow, ETL implications, analytics requirements, data quality and downstream consumers."),
    ("mobile-developer", "You are a mobile developer. Focus on API design from a mobile perspective: payload sizes, offline support, battery impact and mobile-specific UX."),
    ("accessibility-specialist", "You are an accessibility specialist. Focus on WCAG compliance, screen reader support, keyboard navigation, color contrast and inclusive design."),
    ("legal-compliance", "You are a legal and compliance reviewer. Focus on data privacy (GDPR, CCPA), terms of service, liability, audit requirements and regulatory compliance."),
];

const SYSTEM_PRD: &str = "\
You are a senior product manager participating in adversarial spec development.
Critique the Product Requirements Document you receive rigorously: problem definition backed by real user pain, believable personas, user stories, measurable success criteria, explicit scope (in and out), dependencies, and risks with mitigations. A PRD contains no technical implementation details.
Push back on vague requirements, unmeasurable success criteria and missing user context.";

const SYSTEM_TECH: &str = "\
You are a senior software architect participating in adversarial spec development.
Critique the Technical Specification you receive rigorously: architectural decisions with rationale, complete API contracts, data models covering every use case, security threats and mitigations, enumerated error scenarios, measurable performance targets, and a repeatable, reversible deployment strategy.
A good tech spec lets any engineer implement the system without asking clarifying questions.";

const PROPOSER_TEMPLATE: &str = r#"This is round {{ round }} of adversarial spec development. You are responsible for the next revision of the {{ doc_name }}.

Here is the current document:

{{ document }}
{% if context %}
Additional context:
{{ context }}
{% endif %}{% if critiques %}
Reviewers raised the following critiques on the previous revision:
{% for c in critiques %}
- {{ c }}
{% endfor %}{% endif %}{% if feedback %}
A human reviewer requested these changes. They take priority over every other critique:
{% for f in feedback %}
- {{ f }}
{% endfor %}{% endif %}{% if preserve_intent %}
{{ preserve_intent }}
{% endif %}
Address every critique that is valid. Briefly explain what you changed, then output the complete revised document between [SPEC] and [/SPEC] tags."#;

const OPPONENT_TEMPLATE: &str = r#"This is round {{ round }} of adversarial spec development.

Here is the candidate {{ doc_name }}:

{{ document }}
{% if context %}
Additional context:
{{ context }}
{% endif %}{% if focus %}
{{ focus }}
{% endif %}{% if preserve_intent %}
{{ preserve_intent }}
{% endif %}
Review this document according to your criteria.
If it is production-ready, output [AGREE] on its own line followed by the reasons you agree.
Otherwise explain each problem, then list the changes you require as bullet lines under a line reading CHANGES:"#;

const ARBITER_TEMPLATE: &str = r#"This is round {{ round }} of adversarial spec development. {% if press %}The reviewers agreed early and you must verify that agreement before it is accepted.{% else %}All reviewers agreed with the candidate below.{% endif %}

Here is the candidate {{ doc_name }}:

{{ document }}

Reviewer verdicts:
{% for v in verdicts %}
- {{ v }}
{% endfor %}{% if press %}
**Confirm agreement only after reviewing the entire document.**
Before saying [AGREE] you must:
1. List at least 3 specific sections you reviewed and what you verified in each.
2. Explain why the document is complete and production-ready.
3. Identify any remaining concerns, however minor.
{% endif %}
If you confirm that the document is ready and that the reviewers engaged with its substance, output [AGREE] on its own line followed by your reasoning.
Otherwise explain what is still missing."#;

/// Normalize a persona name into its lookup key.
pub fn persona_key(persona: &str) -> String {
    persona.trim().to_lowercase().replace([' ', '_'], "-")
}

/// Known persona text, or a generic role-play prompt for an unknown persona.
pub fn persona_text(persona: &str) -> String {
    let key = persona_key(persona);
    PERSONAS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, text)| (*text).to_string())
        .unwrap_or_else(|| {
            format!(
                "You are a {persona} participating in adversarial spec development. \
                 Review the document from your professional perspective and critique any issues you find."
            )
        })
}

pub fn system_prompt(kind: DocKind, persona: Option<&str>) -> String {
    match persona {
        Some(p) => persona_text(p),
        None => match kind {
            DocKind::Prd => SYSTEM_PRD.to_string(),
            DocKind::TechSpec => SYSTEM_TECH.to_string(),
        },
    }
}

pub fn focus_block(focus: CritiqueFocus) -> String {
    let (title, items) = match focus {
        CritiqueFocus::Security => (
            "SECURITY",
            "authentication and authorization, input validation, injection and SSRF vulnerabilities, secret management, encryption at rest and in transit, audit logging",
        ),
        CritiqueFocus::Scalability => (
            "SCALABILITY",
            "horizontal vs vertical scaling, sharding and replication, caching and invalidation, queues and async processing, connection pooling, capacity planning",
        ),
        CritiqueFocus::Performance => (
            "PERFORMANCE",
            "latency targets (p50, p95, p99), throughput, query optimization, N+1 queries, memory usage, network round trips",
        ),
        CritiqueFocus::Ux => (
            "USER EXPERIENCE",
            "user journey completeness, error and recovery flows, loading states, accessibility, internationalization, onboarding",
        ),
        CritiqueFocus::Reliability => (
            "RELIABILITY",
            "failure modes and recovery, circuit breakers, retries with backoff, consistency guarantees, backup and disaster recovery, SLOs",
        ),
        CritiqueFocus::Cost => (
            "COST EFFICIENCY",
            "infrastructure cost projections, utilization, auto-scaling policies, data transfer costs, third-party services, build vs buy",
        ),
    };
    format!(
        "**CRITICAL FOCUS: {title}**\nPrioritize this above all else. Specifically examine: {items}.\nFlag any gaps here as blocking issues."
    )
}

/// Renders round prompts for one session.
pub struct PromptBuilder {
    env: Environment<'static>,
    kind: DocKind,
    context: Option<String>,
    preserve_intent: bool,
}

impl PromptBuilder {
    pub fn new(
        kind: DocKind,
        context: Option<String>,
        preserve_intent: bool,
    ) -> Result<Self, DebateError> {
        let mut env = Environment::new();
        for (name, source) in [
            ("proposer", PROPOSER_TEMPLATE),
            ("opponent", OPPONENT_TEMPLATE),
            ("arbiter", ARBITER_TEMPLATE),
        ] {
            env.add_template(name, source).map_err(template_error)?;
        }
        Ok(Self {
            env,
            kind,
            context,
            preserve_intent,
        })
    }

    fn preserve_block(&self) -> Option<&'static str> {
        self.preserve_intent.then_some(PRESERVE_INTENT)
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String, DebateError> {
        self.env
            .get_template(name)
            .and_then(|t| t.render(ctx))
            .map_err(template_error)
    }

    /// Revision prompt. `critiques` come from the previous round and
    /// `feedback` from a human reviewer.
    pub fn proposer(
        &self,
        participant: &Participant,
        round: u32,
        document: &str,
        critiques: &[String],
        feedback: &[String],
    ) -> Result<Prompt, DebateError> {
        let user = self.render(
            "proposer",
            context! {
                round => round + 1,
                doc_name => self.kind.display_name(),
                document => document,
                context => self.context.as_deref(),
                critiques => critiques,
                feedback => feedback,
                preserve_intent => self.preserve_block(),
            },
        )?;
        Ok(Prompt {
            system: Some(system_prompt(self.kind, participant.persona.as_deref())),
            user,
        })
    }

    pub fn opponent(
        &self,
        participant: &Participant,
        round: u32,
        candidate: &str,
    ) -> Result<Prompt, DebateError> {
        let user = self.render(
            "opponent",
            context! {
                round => round + 1,
                doc_name => self.kind.display_name(),
                document => candidate,
                context => self.context.as_deref(),
                focus => participant.focus.map(focus_block),
                preserve_intent => self.preserve_block(),
            },
        )?;
        Ok(Prompt {
            system: Some(system_prompt(self.kind, participant.persona.as_deref())),
            user,
        })
    }

    /// Confirmation prompt. `press` selects the stricter early-agreement form.
    pub fn arbiter(
        &self,
        participant: &Participant,
        round: u32,
        candidate: &str,
        verdicts: &[Verdict],
        press: bool,
    ) -> Result<Prompt, DebateError> {
        let verdicts: Vec<String> = verdicts
            .iter()
            .map(|v| {
                let rationale = if v.rationale.trim().is_empty() {
                    "(no rationale given)"
                } else {
                    v.rationale.trim()
                };
                format!("{}: {}", v.role, rationale)
            })
            .collect();
        let user = self.render(
            "arbiter",
            context! {
                round => round + 1,
                doc_name => self.kind.display_name(),
                document => candidate,
                verdicts => verdicts,
                press => press,
            },
        )?;
        Ok(Prompt {
            system: Some(system_prompt(self.kind, participant.persona.as_deref())),
            user,
        })
    }
}

fn template_error(e: minijinja::Error) -> DebateError {
    DebateError::Other(anyhow::anyhow!("prompt template error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use crate::provider::ModelRef;

    fn participant(role: Role) -> Participant {
        Participant::new(role, ModelRef::new("mock", "m"))
    }

    // ─── Persona tests ──────────────────────────────────────────

    #[test]
    fn test_persona_key_normalization() {
        assert_eq!(persona_key("Security Engineer"), "security-engineer");
        assert_eq!(persona_key("qa_engineer"), "qa-engineer");
    }

    #[test]
    fn test_known_persona() {
        assert!(persona_text("QA Engineer").starts_with("You are a QA engineer"));
    }

    #[test]
    fn test_unknown_persona_generic() {
        let text = persona_text("fintech auditor");
        assert!(text.starts_with("You are a fintech auditor participating"));
    }

    #[test]
    fn test_system_prompt_by_kind() {
        assert!(system_prompt(DocKind::Prd, None).contains("product manager"));
        assert!(system_prompt(DocKind::TechSpec, None).contains("software architect"));
        assert!(system_prompt(DocKind::TechSpec, Some("data-engineer"))
            .starts_with("You are a data engineer"));
    }

    #[test]
    fn test_focus_block() {
        let b = focus_block(CritiqueFocus::Ux);
        assert!(b.contains("CRITICAL FOCUS: USER EXPERIENCE"));
    }

    // ─── Template tests ─────────────────────────────────────────

    #[test]
    fn test_proposer_prompt_folds_critiques_and_feedback() {
        let b = PromptBuilder::new(DocKind::TechSpec, Some("payments".into()), false).unwrap();
        let p = b
            .proposer(
                &participant(Role::Proposer),
                1,
                "# Spec",
                &["opponent-1: missing SLOs".to_string()],
                &["cut the admin UI".to_string()],
            )
            .unwrap();
        assert!(p.user.contains("round 2"));
        assert!(p.user.contains("# Spec"));
        assert!(p.user.contains("- opponent-1: missing SLOs"));
        assert!(p.user.contains("- cut the admin UI"));
        assert!(p.user.contains("payments"));
        assert!(p.user.contains("[SPEC] and [/SPEC]"));
        assert!(!p.user.contains("PRESERVE ORIGINAL INTENT"));
    }

    #[test]
    fn test_opponent_prompt_includes_focus_and_intent() {
        let b = PromptBuilder::new(DocKind::Prd, None, true).unwrap();
        let p = b
            .opponent(
                &participant(Role::Opponent(1)).with_focus(CritiqueFocus::Security),
                0,
                "doc",
            )
            .unwrap();
        assert!(p.user.contains("CRITICAL FOCUS: SECURITY"));
        assert!(p.user.contains("PRESERVE ORIGINAL INTENT"));
        assert!(p.user.contains("CHANGES:"));
        assert!(p.system.unwrap().contains("product manager"));
    }

    #[test]
    fn test_arbiter_press_prompt() {
        let b = PromptBuilder::new(DocKind::TechSpec, None, false).unwrap();
        let verdicts = vec![Verdict {
            role: Role::Opponent(1),
            agrees: true,
            rationale: String::new(),
            requested_changes: vec![],
        }];
        let pressed = b
            .arbiter(&participant(Role::Arbiter), 0, "doc", &verdicts, true)
            .unwrap();
        assert!(pressed.user.contains("at least 3 specific sections"));
        assert!(pressed.user.contains("opponent-1: (no rationale given)"));

        let plain = b
            .arbiter(&participant(Role::Arbiter), 3, "doc", &verdicts, false)
            .unwrap();
        assert!(!plain.user.contains("at least 3 specific sections"));
    }
}
