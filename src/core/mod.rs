//! Core provisioning logic.

pub mod config;
pub mod config_store;
pub mod error;
pub mod file_lock;
pub mod identity;
pub mod key_file;
pub mod metrics;
pub mod paths;
pub mod registry;
pub mod remote;
pub mod validator;
pub mod workflow;
