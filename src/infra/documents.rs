// src/infra/documents.rs — Plain-text document load/save

use std::path::Path;

use crate::core::types::DocKind;
use crate::infra::errors::DebateError;
use crate::infra::store::write_atomic;

/// Read a seed document. Empty files are a configuration error: there is
/// nothing to debate.
pub fn load(path: &Path) -> Result<String, DebateError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        DebateError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    if text.trim().is_empty() {
        return Err(DebateError::Configuration(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(text)
}

pub fn save(path: &Path, text: &str) -> Result<(), DebateError> {
    write_atomic(path, text.as_bytes())?;
    tracing::debug!("Saved document to {}", path.display());
    Ok(())
}

/// `payments-tech-v3.md` for stem "payments", a tech spec at version 3.
pub fn versioned_filename(stem: &str, kind: DocKind, version: u32) -> String {
    let stem = stem.trim();
    let stem = if stem.is_empty() { "spec" } else { stem };
    format!("{stem}-{}-v{version}.md", kind.slug())
}

/// File stem of a seed path, used to name exports.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spec")
        .to_string()
}
