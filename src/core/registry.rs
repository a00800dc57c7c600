//! Account registry: local username to ServerAuth credential key.
//!
//! The registry lives in the `[[accounts]]` array of config.toml. Changes are
//! only committed once [`AccountRegistry::persist`] has rewritten the file.

use crate::constants;
use crate::core::config_store;
use crate::core::error::ProvisionError;
use crate::core::file_lock::FileLock;
use crate::core::paths::AgentPaths;
use crate::models::account::Account;
use crate::models::agent_config::AgentFile;
use crate::util::fs as agent_fs;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct AccountRegistry {
    path: PathBuf,
    document: AgentFile,
    _lock: Option<FileLock>,
}

impl AccountRegistry {
    /// Load for reading only; no lock is taken.
    pub fn load(path: &Path) -> Result<Self, ProvisionError> {
        let document = config_store::load(path).map_err(ProvisionError::Registry)?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
            _lock: None,
        })
    }

    /// Lock the registry against other agent processes, then load it.
    ///
    /// The lock is held until the registry is dropped, covering the whole
    /// load-modify-persist cycle. A missing config directory is created first.
    pub fn open_locked(paths: &AgentPaths) -> Result<Self, ProvisionError> {
        agent_fs::create_dir_with_mode(&paths.root, constants::CONFIG_DIR_MODE)
            .with_context(|| format!("create config dir {}", paths.root.display()))
            .map_err(ProvisionError::Registry)?;
        let lock = FileLock::exclusive(&paths.registry_lock)
            .with_context(|| format!("lock {}", paths.registry_lock.display()))
            .map_err(ProvisionError::Registry)?;
        let mut registry = Self::load(&paths.config_toml)?;
        registry._lock = Some(lock);
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The full config document the registry is stored in.
    pub fn document(&self) -> &AgentFile {
        &self.document
    }

    pub fn list(&self) -> &[Account] {
        &self.document.accounts
    }

    pub fn contains(&self, username: &str) -> bool {
        self.list().iter().any(|a| a.username == username)
    }

    /// Append without deduplication; duplicate policy is the caller's call.
    pub fn add(&mut self, account: Account) {
        debug!(username = %account.username, "registry add");
        self.document.accounts.push(account);
    }

    /// Set the credential key on every entry for `username`. Returns how many changed.
    pub fn replace_key(&mut self, username: &str, credential_key: &str) -> usize {
        let mut changed = 0;
        for account in self
            .document
            .accounts
            .iter_mut()
            .filter(|a| a.username == username)
        {
            account.credential_key = credential_key.to_string();
            changed += 1;
        }
        changed
    }

    /// Drop every entry whose username matches exactly. Returns how many were removed.
    pub fn remove(&mut self, username: &str) -> usize {
        let before = self.document.accounts.len();
        self.document.accounts.retain(|a| a.username != username);
        let removed = before - self.document.accounts.len();
        debug!(username, removed, "registry remove");
        removed
    }

    /// Durably write the registry (and the rest of config.toml) back to disk.
    pub fn persist(&self) -> Result<(), ProvisionError> {
        config_store::save(&self.path, &self.document).map_err(ProvisionError::Registry)
    }
}
