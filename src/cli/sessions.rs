// src/cli/sessions.rs — `sessions`, `archive`, `cost`, `export`

use std::path::PathBuf;

use super::EXIT_OK;
use crate::infra::documents;
use crate::infra::store::{SessionStore, SessionSummary};

pub fn run_sessions(store: &SessionStore) -> anyhow::Result<i32> {
    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No sessions in {}", store.root().display());
        return Ok(EXIT_OK);
    }
    println!(
        "  {:<36}  {:<5}  {:>6}  {:<16}  {:>9}  UPDATED",
        "ID", "KIND", "ROUNDS", "STATUS", "COST"
    );
    for s in &sessions {
        println!("{}", format_row(s));
    }
    Ok(EXIT_OK)
}

fn format_row(s: &SessionSummary) -> String {
    format!(
        "  {:<36}  {:<5}  {:>6}  {:<16}  {:>9}  {}",
        s.id,
        s.kind.slug(),
        s.rounds,
        s.status.to_string(),
        format!("${:.4}", s.cost_usd),
        s.updated_at.format("%Y-%m-%d %H:%M")
    )
}

pub fn run_archive(id: &str, store: &SessionStore) -> anyhow::Result<i32> {
    let path = store.archive(id)?;
    println!("Archived {} to {}", id, path.display());
    Ok(EXIT_OK)
}

pub fn run_cost(id: &str, store: &SessionStore) -> anyhow::Result<i32> {
    let session = store.load(id)?;
    println!("{}", session.ledger.report());
    let per_round: Vec<String> = session
        .rounds
        .iter()
        .map(|r| format!("  round {:>2} ({}): ${:.4}", r.index + 1, r.outcome, r.cost_usd()))
        .collect();
    if !per_round.is_empty() {
        println!("By Round:");
        for line in per_round {
            println!("{line}");
        }
    }
    Ok(EXIT_OK)
}

pub fn run_export(id: &str, output: Option<PathBuf>, store: &SessionStore) -> anyhow::Result<i32> {
    let session = store.load(id)?;
    let path = output.unwrap_or_else(|| {
        PathBuf::from(documents::versioned_filename(
            &short_id(&session.id),
            session.document.kind,
            session.document.version,
        ))
    });
    documents::save(&path, &session.document.body)?;
    println!("Wrote v{} to {}", session.document.version, path.display());
    Ok(EXIT_OK)
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}
