// src/infra/store.rs — Durable session state
//
// Layout under the sessions directory:
//   <id>.json             the full Session aggregate, replaced atomically
//   <id>/round-<n>.md     document text after each completed round
//   archive/<id>.json     sessions retired by explicit user action

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::session::Session;
use crate::core::types::{DocKind, SessionStatus};
use crate::infra::errors::DebateError;
use crate::infra::paths;

const ARCHIVE_DIR: &str = "archive";
const MAX_ID_LEN: usize = 128;

/// Listing row for `sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub kind: DocKind,
    pub rounds: usize,
    pub status: SessionStatus,
    pub cost_usd: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            kind: s.document.kind,
            rounds: s.rounds.len(),
            status: s.status,
            cost_usd: s.ledger.total_usd(),
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the default sessions directory.
    pub fn open_default() -> Self {
        Self::new(paths::sessions_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn snapshot_path(&self, id: &str, round: u32) -> PathBuf {
        self.root.join(id).join(format!("round-{round}.md"))
    }

    /// Persist the whole aggregate. The cursor is advanced to cover every
    /// appended round before the write, and rolled back if the write fails.
    pub fn checkpoint(&self, session: &mut Session) -> Result<(), DebateError> {
        validate_session_id(&session.id)?;
        let previous = session.checkpoint_cursor;
        session.checkpoint_cursor = session.rounds.len();

        let written = serde_json::to_vec_pretty(&*session)
            .map_err(DebateError::from)
            .and_then(|json| {
                write_atomic(&self.session_path(&session.id), &json).map_err(DebateError::from)
            });

        match written {
            Ok(()) => {
                tracing::debug!(
                    session = %session.id,
                    cursor = session.checkpoint_cursor,
                    "Checkpoint written"
                );
                Ok(())
            }
            Err(e) => {
                session.checkpoint_cursor = previous;
                Err(e)
            }
        }
    }

    /// Write the current document text as the snapshot of `round`.
    pub fn write_snapshot(&self, session: &Session, round: u32) -> Result<PathBuf, DebateError> {
        validate_session_id(&session.id)?;
        let path = self.snapshot_path(&session.id, round);
        write_atomic(&path, session.document.body.as_bytes())?;
        Ok(path)
    }

    pub fn load(&self, id: &str) -> Result<Session, DebateError> {
        validate_session_id(id)?;
        let path = self.session_path(id);
        if !path.exists() {
            return Err(DebateError::NotFound {
                session_id: id.to_string(),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        let session: Session = serde_json::from_str(&content)
            .map_err(|e| DebateError::corrupt(id, format!("unreadable session file: {e}")))?;
        verify(id, &session)?;
        Ok(session)
    }

    /// Live sessions, most recently updated first. Unreadable files are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<SessionSummary>, DebateError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(id) {
                Ok(session) => sessions.push(SessionSummary::from(&session)),
                Err(e) => tracing::warn!("Skipping session file {}: {}", path.display(), e),
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// Move a session (and its snapshots) under `archive/`.
    pub fn archive(&self, id: &str) -> Result<PathBuf, DebateError> {
        validate_session_id(id)?;
        let src = self.session_path(id);
        if !src.exists() {
            return Err(DebateError::NotFound {
                session_id: id.to_string(),
            });
        }
        let archive = self.root.join(ARCHIVE_DIR);
        std::fs::create_dir_all(&archive)?;

        let dst = archive.join(format!("{id}.json"));
        std::fs::rename(&src, &dst)?;
        let snapshots = self.root.join(id);
        if snapshots.is_dir() {
            std::fs::rename(&snapshots, archive.join(id))?;
        }
        tracing::info!(session = id, "Session archived");
        Ok(dst)
    }
}

/// Reject ids that could escape the sessions directory.
pub fn validate_session_id(id: &str) -> Result<(), DebateError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id != ARCHIVE_DIR
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DebateError::InvalidSessionId(id.to_string()))
    }
}

fn verify(id: &str, session: &Session) -> Result<(), DebateError> {
    if session.id != id {
        return Err(DebateError::corrupt(
            id,
            format!("file holds session '{}'", session.id),
        ));
    }
    if session.checkpoint_cursor > session.rounds.len() {
        return Err(DebateError::corrupt(
            id,
            format!(
                "checkpoint cursor {} exceeds {} recorded rounds",
                session.checkpoint_cursor,
                session.rounds.len()
            ),
        ));
    }
    if !session.document.history_is_monotonic() {
        return Err(DebateError::corrupt(
            id,
            "document version history is not monotonic",
        ));
    }
    if let Some((pos, round)) = session
        .rounds
        .iter()
        .enumerate()
        .find(|(pos, r)| r.index as usize != *pos)
    {
        return Err(DebateError::corrupt(
            id,
            format!("round at position {pos} has index {}", round.index),
        ));
    }
    Ok(())
}

/// Write to a sibling temp file, sync, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("checkpoint");
    let tmp = dir.join(format!(".{name}.tmp"));

    let mut f = std::fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.flush()?;
    f.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
