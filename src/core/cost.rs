// src/core/cost.rs — Per-session cost ledger

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::gateway::CallResult;
use crate::provider::{ModelRef, TokenUsage};

/// Accumulated spend for one model identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Running totals keyed by model identity. Only the debate engine writes to it,
/// and only when it commits a round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    by_model: BTreeMap<String, LedgerEntry>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &ModelRef, usage: &TokenUsage, cost_usd: f64) {
        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.calls += 1;
        entry.input_tokens += usage.input_tokens as u64;
        entry.output_tokens += usage.output_tokens as u64;
        entry.cost_usd += cost_usd;
    }

    pub fn record_call(&mut self, call: &CallResult) {
        self.record(&call.model, &call.usage, call.cost_usd);
    }

    pub fn total_usd(&self) -> f64 {
        self.by_model.values().map(|e| e.cost_usd).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.by_model
            .values()
            .map(|e| e.input_tokens + e.output_tokens)
            .sum()
    }

    pub fn total_calls(&self) -> u64 {
        self.by_model.values().map(|e| e.calls).sum()
    }

    pub fn entry(&self, model: &ModelRef) -> Option<&LedgerEntry> {
        self.by_model.get(&model.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.by_model.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "${:.4} total ({} calls, {} models)",
            self.total_usd(),
            self.total_calls(),
            self.by_model.len()
        )
    }

    /// Model breakdown sorted by cost, most expensive first.
    pub fn breakdown(&self) -> Vec<(&str, &LedgerEntry)> {
        let mut entries: Vec<_> = self
            .by_model
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_by(|a, b| {
            b.1.cost_usd
                .partial_cmp(&a.1.cost_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }

    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("═══ Debate Cost ═══\n");
        report.push_str(&format!("Total: ${:.4}\n", self.total_usd()));
        report.push_str(&format!("Total tokens: {}\n", self.total_tokens()));
        report.push_str(&format!("Total API calls: {}\n", self.total_calls()));

        if !self.by_model.is_empty() {
            report.push_str("\nBy Model:\n");
            for (model, entry) in self.breakdown() {
                report.push_str(&format!(
                    "  {}: ${:.4} ({} calls, {}in/{}out tokens)\n",
                    model, entry.cost_usd, entry.calls, entry.input_tokens, entry.output_tokens,
                ));
            }
        }
        report
    }
}
