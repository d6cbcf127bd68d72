// src/integrations/mod.rs — Human feedback channels

pub mod telegram;
pub mod types;
