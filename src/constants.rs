//! Centralized constants for permissions, paths, and the remote API.

/// Default configuration directory.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/serverauth";

/// Name of the configuration document inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file written by the installer of earlier agent releases.
pub const LEGACY_CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "SERVERAUTH_CONFIG_DIR";

/// Base URL used when `basedomain` is not configured.
pub const DEFAULT_BASE_DOMAIN: &str = "https://api.serverauth.com/";

/// Agent version reported in the User-Agent header.
pub const AGENT_VERSION: &str = "2.0.0";

/// Timeout for every request to the remote API.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Permission mode for `~/.ssh`.
pub const SSH_DIR_MODE: u32 = 0o700;

/// Permission mode for `authorized_keys`.
pub const AUTHORIZED_KEYS_MODE: u32 = 0o600;

/// Permission mode for config.toml (holds API keys).
pub const CONFIG_FILE_MODE: u32 = 0o600;

/// Permission mode for the lock directory.
pub const LOCK_DIR_MODE: u32 = 0o700;

/// Mode for a config directory the agent has to create itself.
pub const CONFIG_DIR_MODE: u32 = 0o700;

/// Directory under the home directory holding SSH state.
pub const SSH_DIR_NAME: &str = ".ssh";

/// Managed key file name.
pub const AUTHORIZED_KEYS_NAME: &str = "authorized_keys";

/// First backup name for a pre-existing key file.
pub const BACKUP_NAME: &str = "authorized_keys.bak";

/// Begin marker every valid key blob must contain.
pub const KEYS_START_MARKER: &str = "START ServerAuth Managed Keys File";

/// End marker every valid key blob must contain.
pub const KEYS_END_MARKER: &str = "END ServerAuth Managed Keys File";

/// Placeholder written to a freshly managed key file until the first sync.
pub const KEYS_FILE_TEMPLATE: &str = "# This file is managed by ServerAuth.\n\
# Any changes made will be overwritten.\n\
# If you do not have an account please contact the server owner for assistance.\n";
