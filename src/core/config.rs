//! Resolved, immutable server configuration.

use crate::constants;
use crate::core::error::ProvisionError;
use crate::models::account::redact;
use crate::models::agent_config::AgentFile;
use std::env;
use std::fmt;

pub const ORGID_ENV: &str = "SERVERAUTH_ORGID";
pub const APIKEY_ENV: &str = "SERVERAUTH_APIKEY";
pub const TEAMKEY_ENV: &str = "SERVERAUTH_TEAMKEY";
pub const BASEDOMAIN_ENV: &str = "SERVERAUTH_BASEDOMAIN";

/// Unprefixed names read by earlier agent releases; consulted after the
/// `SERVERAUTH_*` ones.
pub const LEGACY_ORGID_ENV: &str = "ORGID";
pub const LEGACY_APIKEY_ENV: &str = "APIKEY";
pub const LEGACY_TEAMKEY_ENV: &str = "TEAMKEY";
pub const LEGACY_BASEDOMAIN_ENV: &str = "BASEDOMAIN";

/// Server identity and API location, fixed for the lifetime of the process.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub organization_id: String,
    pub server_api_key: String,
    pub team_api_key: String,
    /// Always ends with `/`.
    pub base_domain: String,
}

impl ServerConfig {
    /// Resolve from the config file, letting `SERVERAUTH_*` (or the legacy
    /// unprefixed) variables override it.
    pub fn resolve(file: &AgentFile) -> Result<Self, ProvisionError> {
        Self::resolve_with(file, |name| env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with<F>(file: &AgentFile, lookup: F) -> Result<Self, ProvisionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |(var, legacy): (&str, &str), from_file: &Option<String>| -> Option<String> {
            lookup(var)
                .or_else(|| lookup(legacy))
                .or_else(|| from_file.clone())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let organization_id = pick((ORGID_ENV, LEGACY_ORGID_ENV), &file.orgid).ok_or_else(|| {
            ProvisionError::Configuration("the organisation id (orgid) is missing".into())
        })?;
        let server_api_key = pick((APIKEY_ENV, LEGACY_APIKEY_ENV), &file.apikey).ok_or_else(|| {
            ProvisionError::Configuration("the server API key (apikey) is missing".into())
        })?;
        let team_api_key = pick((TEAMKEY_ENV, LEGACY_TEAMKEY_ENV), &file.teamkey).ok_or_else(|| {
            ProvisionError::Configuration("the team API key (teamkey) is missing".into())
        })?;
        let base_domain = pick((BASEDOMAIN_ENV, LEGACY_BASEDOMAIN_ENV), &file.basedomain)
            .map(|d| normalize_base(&d))
            .unwrap_or_else(|| constants::DEFAULT_BASE_DOMAIN.to_string());

        Ok(Self {
            organization_id,
            server_api_key,
            team_api_key,
            base_domain,
        })
    }
}

fn normalize_base(domain: &str) -> String {
    if domain.ends_with('/') {
        domain.to_string()
    } else {
        format!("{}/", domain)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("organization_id", &self.organization_id)
            .field("server_api_key", &redact(&self.server_api_key))
            .field("team_api_key", &redact(&self.team_api_key))
            .field("base_domain", &self.base_domain)
            .finish()
    }
}
