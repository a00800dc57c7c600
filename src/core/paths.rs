//! Agent path resolution.

use crate::constants;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub root: PathBuf,
    pub config_toml: PathBuf,
    /// config.yaml of earlier releases; only checked for, never read.
    pub legacy_config: PathBuf,
    pub registry_lock: PathBuf,
    /// Per-account lock files for authorized_keys writes.
    pub lock_dir: PathBuf,
}

impl AgentPaths {
    /// Resolve the config directory from CLI arg, env var, or the default.
    pub fn resolve(root_arg: Option<PathBuf>) -> Self {
        if let Some(root) = root_arg {
            return Self::from_root(root);
        }
        if let Ok(root) = env::var(constants::CONFIG_DIR_ENV) {
            if !root.trim().is_empty() {
                return Self::from_root(PathBuf::from(root));
            }
        }
        Self::from_root(PathBuf::from(constants::DEFAULT_CONFIG_DIR))
    }

    pub fn from_root(root: PathBuf) -> Self {
        let config_toml = root.join(constants::CONFIG_FILE_NAME);
        let legacy_config = root.join(constants::LEGACY_CONFIG_FILE_NAME);
        let registry_lock = root.join("registry.lock");
        let lock_dir = root.join("locks");
        Self {
            root,
            config_toml,
            legacy_config,
            registry_lock,
            lock_dir,
        }
    }

    /// Only the config.yaml of an earlier release is present.
    pub fn needs_migration(&self) -> bool {
        !self.config_toml.exists() && self.legacy_config.exists()
    }

    /// Lock file guarding one account's authorized_keys.
    pub fn account_lock(&self, username: &str) -> PathBuf {
        account_lock_path(&self.lock_dir, username)
    }
}

pub fn account_lock_path(lock_dir: &Path, username: &str) -> PathBuf {
    lock_dir.join(format!("{}.lock", username))
}

impl std::fmt::Display for AgentPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "serverauth@{}", self.root.display())
    }
}
