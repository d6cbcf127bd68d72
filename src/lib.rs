// src/lib.rs — Library root for adversarial-spec

pub mod cli;
pub mod core;
pub mod infra;
pub mod integrations;
pub mod provider;
