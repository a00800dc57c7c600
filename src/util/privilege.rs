//! Privilege checks for commands that change file ownership.

use anyhow::{bail, Result};

/// Check if the current process is running as root (euid 0).
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Require root for a given command, or bail with an error.
pub fn require_root(command: &str) -> Result<()> {
    if !is_root() {
        bail!(
            "'{}' changes ownership of users' SSH files and must run as root. Run with sudo.",
            command
        );
    }
    Ok(())
}
