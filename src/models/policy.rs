//! Policy configuration for provisioning operations.

use serde::{Deserialize, Serialize};

/// What `add` does when the username is already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Append another entry; sync then processes the account once per entry.
    #[default]
    Append,
    /// Refuse the add and leave the registry untouched.
    Reject,
    /// Swap the credential key of the existing entry.
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    #[serde(default)]
    pub duplicate_accounts: DuplicatePolicy,

    /// Hold a per-account lock file while writing authorized_keys.
    #[serde(default = "default_lock_key_files")]
    pub lock_key_files: bool,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            duplicate_accounts: DuplicatePolicy::default(),
            lock_key_files: default_lock_key_files(),
        }
    }
}

fn default_lock_key_files() -> bool {
    true
}
