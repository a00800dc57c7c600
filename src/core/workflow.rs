//! Add / Remove / Sync over the registry, local accounts, and key files.

use crate::constants;
use crate::core::config::ServerConfig;
use crate::core::error::ProvisionError;
use crate::core::file_lock::FileLock;
use crate::core::identity::{IdentityResolver, OsIdentity};
use crate::core::key_file::{Initialized, KeyFile};
use crate::core::paths::account_lock_path;
use crate::core::registry::AccountRegistry;
use crate::core::remote::{KeyRequest, KeySource};
use crate::core::validator;
use crate::models::account::{redact, Account};
use crate::models::policy::{DuplicatePolicy, PolicySection};
use crate::util::fs as agent_fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug)]
pub struct AddOutcome {
    pub identity: OsIdentity,
    pub created_ssh_dir: bool,
    /// Where a pre-existing authorized_keys was preserved.
    pub backup: Option<PathBuf>,
    /// True when an existing registration had its key replaced.
    pub replaced: bool,
}

#[derive(Debug)]
pub struct RemoveOutcome {
    pub identity: OsIdentity,
    /// Registry entries dropped; 0 when the user was not registered.
    pub removed: usize,
}

#[derive(Debug)]
pub struct SyncedFile {
    pub path: PathBuf,
    pub bytes: usize,
    pub created_ssh_dir: bool,
}

#[derive(Debug)]
pub struct AccountOutcome {
    pub username: String,
    pub result: Result<SyncedFile, ProvisionError>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<AccountOutcome>,
}

impl SyncReport {
    pub fn synced(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.synced()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs provisioning operations for one immutable server configuration.
pub struct Provisioner<R, S> {
    config: ServerConfig,
    resolver: R,
    source: S,
    policy: PolicySection,
    lock_dir: Option<PathBuf>,
}

impl<R: IdentityResolver, S: KeySource> Provisioner<R, S> {
    pub fn new(config: ServerConfig, resolver: R, source: S) -> Self {
        Self {
            config,
            resolver,
            source,
            policy: PolicySection::default(),
            lock_dir: None,
        }
    }

    pub fn with_policy(mut self, policy: PolicySection) -> Self {
        self.policy = policy;
        self
    }

    /// Directory for per-account lock files; honoured when `lock_key_files` is set.
    pub fn with_lock_dir(mut self, lock_dir: PathBuf) -> Self {
        self.lock_dir = Some(lock_dir);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Register `username` and put its authorized_keys under management.
    ///
    /// The registry is persisted before any file is touched, so a failed
    /// persist leaves the filesystem unchanged.
    pub fn add(
        &self,
        registry: &mut AccountRegistry,
        username: &str,
        credential_key: &str,
    ) -> Result<AddOutcome, ProvisionError> {
        let identity = self.lookup(username)?;
        info!(username, uid = identity.uid, gid = identity.gid, "found system user");

        let mut replaced = false;
        if registry.contains(username) {
            match self.policy.duplicate_accounts {
                DuplicatePolicy::Append => {
                    warn!(username, "account already registered; appending another entry");
                    registry.add(Account::new(username, credential_key));
                }
                DuplicatePolicy::Reject => {
                    return Err(ProvisionError::DuplicateAccount(username.to_string()));
                }
                DuplicatePolicy::Replace => {
                    registry.replace_key(username, credential_key);
                    replaced = true;
                }
            }
        } else {
            registry.add(Account::new(username, credential_key));
        }
        registry.persist()?;
        info!(username, key = %redact(credential_key), "account registered");

        let key_file = KeyFile::for_identity(&identity);
        let _lock = self.account_lock(username)?;
        let created_ssh_dir = key_file.ensure_directory()?;
        let backup = match key_file.initialize(constants::KEYS_FILE_TEMPLATE)? {
            Initialized::Created => None,
            Initialized::BackedUp(path) => Some(path),
        };

        Ok(AddOutcome {
            identity,
            created_ssh_dir,
            backup,
            replaced,
        })
    }

    /// Deregister `username`. Its authorized_keys is left exactly as it is.
    pub fn remove(
        &self,
        registry: &mut AccountRegistry,
        username: &str,
    ) -> Result<RemoveOutcome, ProvisionError> {
        let identity = self.lookup(username)?;
        let removed = registry.remove(username);
        registry.persist()?;
        if removed == 0 {
            warn!(username, "account was not registered");
        } else {
            info!(username, removed, "account deregistered");
        }
        Ok(RemoveOutcome { identity, removed })
    }

    /// Refresh every registered account's authorized_keys from the API.
    ///
    /// Accounts are processed one at a time and independently: a failure is
    /// recorded for that account and the next one is still attempted.
    pub fn sync(&self, registry: &AccountRegistry) -> SyncReport {
        let outcomes = registry
            .list()
            .iter()
            .map(|account| {
                let result = self.sync_account(account);
                if let Err(e) = &result {
                    warn!(username = %account.username, error = %e, "sync failed");
                }
                AccountOutcome {
                    username: account.username.clone(),
                    result,
                }
            })
            .collect();
        SyncReport { outcomes }
    }

    fn sync_account(&self, account: &Account) -> Result<SyncedFile, ProvisionError> {
        let identity = self.lookup(&account.username)?;

        let request = KeyRequest {
            base_url: &self.config.base_domain,
            organization_id: &self.config.organization_id,
            server_api_key: &self.config.server_api_key,
            account_api_key: &account.credential_key,
        };
        let blob = self
            .source
            .fetch(&request)
            .map_err(|source| ProvisionError::RemoteFetch {
                username: account.username.clone(),
                source,
            })?;
        if !validator::validate(&blob) {
            return Err(ProvisionError::Validation(account.username.clone()));
        }

        let key_file = KeyFile::for_identity(&identity);
        let _lock = self.account_lock(&account.username)?;
        let created_ssh_dir = key_file.ensure_directory()?;
        key_file.replace(&blob)?;
        info!(username = %account.username, path = %key_file.path.display(), "keys synced");

        Ok(SyncedFile {
            path: key_file.path,
            bytes: blob.len(),
            created_ssh_dir,
        })
    }

    fn lookup(&self, username: &str) -> Result<OsIdentity, ProvisionError> {
        match self.resolver.resolve(username) {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => Err(ProvisionError::AccountResolution {
                username: username.to_string(),
                detail: "no such user on this server".to_string(),
            }),
            Err(e) => Err(ProvisionError::AccountResolution {
                username: username.to_string(),
                detail: e.to_string(),
            }),
        }
    }

    fn account_lock(&self, username: &str) -> Result<Option<FileLock>, ProvisionError> {
        let lock_dir = match (&self.lock_dir, self.policy.lock_key_files) {
            (Some(dir), true) => dir,
            _ => return Ok(None),
        };
        agent_fs::create_dir_with_mode(lock_dir, constants::LOCK_DIR_MODE)
            .map_err(ProvisionError::filesystem("create directory", lock_dir))?;
        let path = account_lock_path(lock_dir, username);
        FileLock::exclusive(&path)
            .map(Some)
            .map_err(ProvisionError::filesystem("lock", path))
    }
}
