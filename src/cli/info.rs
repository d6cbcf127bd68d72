// src/cli/info.rs — `personas`, `focus-areas` and `providers`

use super::EXIT_OK;
use crate::core::prompts::{focus_block, PERSONAS};
use crate::core::types::CritiqueFocus;
use crate::provider::resolver::{self, ProviderStatus};

pub fn run_personas() -> anyhow::Result<i32> {
    println!("Built-in personas (use with --persona or [[models.opponents]] persona):\n");
    for (key, text) in PERSONAS {
        println!("  {:<26} {}", key, first_sentence(text));
    }
    println!("\nAny other name is used as a free-form persona.");
    Ok(EXIT_OK)
}

pub fn run_focus_areas() -> anyhow::Result<i32> {
    println!("Critique focus areas (use with --focus):\n");
    for focus in CritiqueFocus::ALL {
        let block = focus_block(focus);
        let summary = block
            .lines()
            .nth(1)
            .unwrap_or_default()
            .trim_start_matches("Prioritize this above all else. Specifically examine: ");
        println!("  {:<12} {}", focus.key(), summary);
    }
    Ok(EXIT_OK)
}

pub fn run_providers() -> anyhow::Result<i32> {
    println!("Providers (API keys are read from the environment):\n");
    for status in resolver::provider_status() {
        println!("{}", format_provider(&status));
    }
    println!("\nOpenAI-compatible endpoints: set OPENAI_BASE_URL alongside OPENAI_API_KEY.");
    Ok(EXIT_OK)
}

fn format_provider(status: &ProviderStatus) -> String {
    format!(
        "  {:<12} {:<20} {:<10} models as {}/<model>",
        status.name,
        status.env_var,
        if status.configured { "[set]" } else { "[not set]" },
        status.id
    )
}

fn first_sentence(text: &str) -> &str {
    match text.find(". ") {
        Some(i) => &text[..=i],
        None => text,
    }
}
