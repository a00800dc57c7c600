//! Utility modules for filesystem and privilege handling.

pub mod fs;
pub mod privilege;
