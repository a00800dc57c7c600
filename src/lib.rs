//! ServerAuth host agent.
//!
//! Keeps each registered local account's `~/.ssh/authorized_keys` in step
//! with the keys the ServerAuth API publishes for it, and reports host
//! metrics back to the same API.
//!
//! ## Modules
//! - `cli`: Command-line handlers
//! - `core`: Provisioning logic (registry, key files, remote source, workflow)
//! - `models`: Data structures
//! - `util`: System utilities (fs, privilege)

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod util;
