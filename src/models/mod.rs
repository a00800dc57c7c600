//! Data structures persisted in config.toml.

pub mod account;
pub mod agent_config;
pub mod policy;
