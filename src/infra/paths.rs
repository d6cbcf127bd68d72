// src/infra/paths.rs — Where config and sessions live
//
// One root holds both: $ADVSPEC_HOME when set, otherwise the platform config
// directory (~/.config/adversarial-spec on Linux).

use std::ffi::OsString;
use std::path::PathBuf;

use directories::ProjectDirs;

/// Root directory for `config.toml` and `sessions/`.
pub fn root() -> PathBuf {
    root_from(std::env::var_os("ADVSPEC_HOME"))
}

fn root_from(home_override: Option<OsString>) -> PathBuf {
    match home_override.filter(|h| !h.is_empty()) {
        Some(home) => PathBuf::from(home),
        None => ProjectDirs::from("", "", "adversarial-spec")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".adversarial-spec")),
    }
}

pub fn config_file_path() -> PathBuf {
    root().join("config.toml")
}

/// One JSON file per session, plus per-session snapshot directories.
pub fn sessions_dir() -> PathBuf {
    root().join("sessions")
}
