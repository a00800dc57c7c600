//! Agent configuration file model.

use crate::models::account::Account;
use crate::models::policy::PolicySection;
use serde::{Deserialize, Serialize};

/// On-disk layout of config.toml: server settings, policy, and the account registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orgid: Option<String>,
    /// Server API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apikey: Option<String>,
    /// Team API key, used for monitoring submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teamkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basedomain: Option<String>,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub accounts: Vec<Account>,
}
