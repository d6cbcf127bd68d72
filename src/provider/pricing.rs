// src/provider/pricing.rs — Per-call cost estimation

use std::collections::HashMap;

use super::{ModelRef, TokenUsage};
use crate::infra::config::PriceEntry;

/// Price lookup: explicit overrides first, then the built-in heuristic table.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    overrides: HashMap<String, PriceEntry>,
}

impl PriceTable {
    pub fn new(overrides: HashMap<String, PriceEntry>) -> Self {
        Self { overrides }
    }

    pub fn with_price(mut self, model: &ModelRef, input: f64, output: f64) -> Self {
        self.overrides
            .insert(model.to_string(), PriceEntry { input, output });
        self
    }

    /// Returns (input_price_per_mtok, output_price_per_mtok).
    pub fn pricing(&self, model: &ModelRef) -> (f64, f64) {
        match self.overrides.get(&model.to_string()) {
            Some(p) => (p.input, p.output),
            None => model_pricing(&model.model),
        }
    }

    /// Estimated cost in USD for one call.
    pub fn cost(&self, model: &ModelRef, usage: &TokenUsage) -> f64 {
        let (input_price, output_price) = self.pricing(model);
        (usage.input_tokens as f64 / 1_000_000.0) * input_price
            + (usage.output_tokens as f64 / 1_000_000.0) * output_price
    }
}

/// Returns (input_price_per_mtok, output_price_per_mtok).
pub fn model_pricing(model: &str) -> (f64, f64) {
    match model {
        // Anthropic
        m if m.contains("claude-opus") => (15.0, 75.0),
        m if m.contains("claude-sonnet") => (3.0, 15.0),
        m if m.contains("haiku") => (0.8, 4.0),

        // OpenAI
        m if m.contains("gpt-4.1-mini") => (0.4, 1.6),
        m if m.contains("gpt-4.1") => (2.0, 8.0),
        m if m.contains("gpt-4o-mini") => (0.15, 0.6),
        m if m.contains("gpt-4o") => (2.5, 10.0),
        m if m.contains("o3-mini") || m.contains("o4-mini") => (1.1, 4.4),
        m if m.contains("o3") => (10.0, 40.0),

        // Google Gemini
        m if m.contains("gemini-2.5-pro") => (1.25, 10.0),
        m if m.contains("gemini-2.5-flash") => (0.15, 0.6),
        m if m.contains("gemini-2.0-flash") => (0.1, 0.4),

        // Local models (free)
        m if m.contains("llama")
            || m.contains("mistral")
            || m.contains("qwen")
            || m.contains("deepseek") =>
        {
            (0.0, 0.0)
        }

        // Default: assume moderate pricing
        _ => (1.0, 3.0),
    }
}
