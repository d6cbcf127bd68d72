// src/core/registry.rs — Role-to-participant bindings for one session

use std::collections::HashMap;

use super::types::{Participant, Role};
use crate::infra::config::ModelsConfig;
use crate::infra::errors::DebateError;
use crate::provider::ModelRef;

/// Immutable lookup from debate role to configured participant.
/// Ordered: proposer, opponents in registration order, arbiter.
#[derive(Debug, Clone)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
    warnings: Vec<String>,
}

impl ParticipantRegistry {
    /// Build from the `[models]` config section.
    pub fn from_config(models: &ModelsConfig) -> Result<Self, DebateError> {
        let proposer = required_model("proposer", models.proposer.as_deref())?;
        let arbiter = required_model("arbiter", models.arbiter.as_deref())?;

        let mut participants = vec![Participant::new(Role::Proposer, proposer)];
        for (i, opp) in models.opponents.iter().enumerate() {
            let model = ModelRef::parse(&opp.model).ok_or_else(|| {
                DebateError::Configuration(format!(
                    "opponent {} model '{}' is not in provider/model form",
                    i + 1,
                    opp.model
                ))
            })?;
            participants.push(Participant {
                role: Role::Opponent(i as u32 + 1),
                model,
                persona: opp.persona.clone(),
                focus: opp.focus,
            });
        }
        participants.push(Participant::new(Role::Arbiter, arbiter));

        Self::from_participants(participants)
    }

    /// Validate an explicit participant set, e.g. one restored from a session.
    pub fn from_participants(participants: Vec<Participant>) -> Result<Self, DebateError> {
        let count = |pred: fn(&Role) -> bool| participants.iter().filter(|p| pred(&p.role)).count();
        match count(|r| *r == Role::Proposer) {
            0 => return Err(DebateError::Configuration("no proposer model bound".into())),
            1 => {}
            n => {
                return Err(DebateError::Configuration(format!(
                    "{n} proposers bound, expected exactly one"
                )))
            }
        }
        match count(|r| *r == Role::Arbiter) {
            0 => return Err(DebateError::Configuration("no arbiter model bound".into())),
            1 => {}
            n => {
                return Err(DebateError::Configuration(format!(
                    "{n} arbiters bound, expected exactly one"
                )))
            }
        }

        let mut opponent_indices: Vec<u32> = participants
            .iter()
            .filter_map(|p| match p.role {
                Role::Opponent(i) => Some(i),
                _ => None,
            })
            .collect();
        opponent_indices.sort_unstable();
        if opponent_indices.is_empty() {
            return Err(DebateError::Configuration(
                "at least one opponent must be configured".into(),
            ));
        }
        let expected: Vec<u32> = (1..=opponent_indices.len() as u32).collect();
        if opponent_indices != expected {
            return Err(DebateError::Configuration(format!(
                "opponent indices {opponent_indices:?} must be exactly 1..={}",
                opponent_indices.len()
            )));
        }

        let mut ordered = Vec::with_capacity(participants.len());
        let mut rest = participants;
        if let Some(pos) = rest.iter().position(|p| p.role == Role::Proposer) {
            ordered.push(rest.remove(pos));
        }
        let arbiter_pos = rest.iter().position(|p| p.role == Role::Arbiter);
        let arbiter = arbiter_pos.map(|pos| rest.remove(pos));
        rest.sort_by_key(|p| match p.role {
            Role::Opponent(i) => i,
            _ => 0,
        });
        ordered.extend(rest);
        ordered.extend(arbiter);

        let warnings = shared_identity_warnings(&ordered);
        for w in &warnings {
            tracing::warn!("{}", w);
        }

        Ok(Self {
            participants: ordered,
            warnings,
        })
    }

    pub fn resolve(&self, role: &Role) -> Result<&Participant, DebateError> {
        self.participants
            .iter()
            .find(|p| &p.role == role)
            .ok_or_else(|| DebateError::Configuration(format!("no participant bound to {role}")))
    }

    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    pub fn proposer(&self) -> &Participant {
        &self.participants[0]
    }

    pub fn arbiter(&self) -> &Participant {
        &self.participants[self.participants.len() - 1]
    }

    /// Opponents in registration order.
    pub fn opponents(&self) -> &[Participant] {
        &self.participants[1..self.participants.len() - 1]
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn into_participants(self) -> Vec<Participant> {
        self.participants
    }
}

fn required_model(role: &str, value: Option<&str>) -> Result<ModelRef, DebateError> {
    let raw = value.ok_or_else(|| {
        DebateError::Configuration(format!("no {role} model configured ([models].{role})"))
    })?;
    ModelRef::parse(raw).ok_or_else(|| {
        DebateError::Configuration(format!(
            "{role} model '{raw}' is not in provider/model form"
        ))
    })
}

/// Roles sharing one model identity share that model's rate limit.
fn shared_identity_warnings(participants: &[Participant]) -> Vec<String> {
    let mut by_model: HashMap<&ModelRef, Vec<String>> = HashMap::new();
    for p in participants {
        by_model.entry(&p.model).or_default().push(p.role.to_string());
    }
    let mut warnings: Vec<String> = by_model
        .into_iter()
        .filter(|(_, roles)| roles.len() > 1)
        .map(|(model, roles)| {
            format!(
                "roles {} share model {}; their calls share one rate limit",
                roles.join(", "),
                model
            )
        })
        .collect();
    warnings.sort();
    warnings
}
