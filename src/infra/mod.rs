// src/infra/mod.rs — Infrastructure: config, persistence, errors, logging

pub mod config;
pub mod documents;
pub mod errors;
pub mod logger;
pub mod paths;
pub mod store;
