// src/core/parser.rs — Parse participant replies into structured results

use serde::Deserialize;

use super::prompts::{AGREE_MARKER, CHANGES_HEADER, SPEC_CLOSE, SPEC_OPEN};
use super::types::{ArbiterConfirmation, Role, Verdict};
use crate::infra::errors::DebateError;

/// Text between `[SPEC]` and `[/SPEC]`, trimmed. `None` when the tags are
/// missing or the block is empty.
pub fn extract_spec(text: &str) -> Option<String> {
    let start = text.find(SPEC_OPEN)? + SPEC_OPEN.len();
    let end = text[start..].find(SPEC_CLOSE)? + start;
    let body = text[start..end].trim();
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}

/// True when `[AGREE]` starts a line of the reply.
pub fn has_agree_marker(text: &str) -> bool {
    text.lines()
        .any(|line| line.trim_start().starts_with(AGREE_MARKER))
}

#[derive(Deserialize)]
struct JsonVerdict {
    agrees: bool,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    requested_changes: Vec<String>,
}

/// Parse an opponent reply. Accepts the marker protocol or a JSON verdict
/// object, optionally inside a ```json fence.
pub fn parse_verdict(role: &Role, text: &str) -> Result<Verdict, DebateError> {
    let verdict = match json_payload(text) {
        Some(payload) => {
            let raw: JsonVerdict = serde_json::from_str(payload).map_err(|e| {
                DebateError::malformed(role.to_string(), format!("invalid verdict JSON: {e}"))
            })?;
            Verdict {
                role: role.clone(),
                agrees: raw.agrees,
                rationale: raw.rationale.trim().to_string(),
                requested_changes: raw
                    .requested_changes
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
            }
        }
        None => {
            let (rationale, requested_changes) = split_changes(&strip_spec_block(text));
            Verdict {
                role: role.clone(),
                agrees: has_agree_marker(text),
                rationale,
                requested_changes,
            }
        }
    };

    if !verdict.agrees && verdict.rationale.is_empty() && verdict.requested_changes.is_empty() {
        return Err(DebateError::malformed(
            role.to_string(),
            "disagreement without rationale or requested changes",
        ));
    }
    Ok(verdict)
}

/// Parse the arbiter's confirmation reply. Any reply without the marker is a
/// refusal; its text becomes the critique.
pub fn parse_confirmation(text: &str) -> ArbiterConfirmation {
    let confirmed = has_agree_marker(text);
    let (rationale, changes) = split_changes(&strip_spec_block(text));
    let mut rationale = rationale;
    for change in changes {
        rationale.push_str("\n- ");
        rationale.push_str(&change);
    }
    ArbiterConfirmation {
        confirmed,
        rationale: rationale.trim().to_string(),
    }
}

fn json_payload(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    (inner.starts_with('{') && inner.ends_with('}')).then_some(inner)
}

fn strip_spec_block(text: &str) -> String {
    match (text.find(SPEC_OPEN), text.find(SPEC_CLOSE)) {
        (Some(start), Some(end)) if end > start => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..start]);
            out.push_str(&text[end + SPEC_CLOSE.len()..]);
            out
        }
        _ => text.to_string(),
    }
}

/// Split a reply into rationale prose and the bullet list under `CHANGES:`.
fn split_changes(text: &str) -> (String, Vec<String>) {
    let mut rationale = Vec::new();
    let mut changes = Vec::new();
    let mut in_changes = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with(AGREE_MARKER) {
            let rest = trimmed[AGREE_MARKER.len()..].trim();
            if !rest.is_empty() {
                rationale.push(rest);
            }
            continue;
        }
        if trimmed.eq_ignore_ascii_case(CHANGES_HEADER) {
            in_changes = true;
            continue;
        }
        if in_changes {
            if let Some(item) = bullet_item(trimmed) {
                changes.push(item.to_string());
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
            in_changes = false;
        }
        rationale.push(line);
    }

    (rationale.join("\n").trim().to_string(), changes)
}

fn bullet_item(line: &str) -> Option<&str> {
    let item = if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        rest
    } else {
        let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        line[digits..]
            .strip_prefix(". ")
            .or_else(|| line[digits..].strip_prefix(") "))?
    };
    let item = item.trim();
    (!item.is_empty()).then_some(item)
}
