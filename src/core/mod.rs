// src/core/mod.rs — Debate domain: sessions, rounds, convergence, review

pub mod convergence;
pub mod cost;
pub mod engine;
pub mod parser;
pub mod prompts;
pub mod registry;
pub mod review;
pub mod session;
pub mod types;
