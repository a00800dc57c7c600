//! Error taxonomy for provisioning operations.

use std::path::PathBuf;

/// Failure of a single provisioning step.
///
/// Only [`ProvisionError::Configuration`] and [`ProvisionError::Registry`] are
/// fatal to the whole run; everything else is scoped to one account.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unable to find user `{username}`: {detail}")]
    AccountResolution { username: String, detail: String },

    #[error("fetching keys for `{username}` failed: {source}")]
    RemoteFetch {
        username: String,
        #[source]
        source: FetchError,
    },

    #[error("the ServerAuth API returned an invalid key file for `{0}`")]
    Validation(String),

    #[error("{action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("account registry: {0:#}")]
    Registry(anyhow::Error),

    #[error("account `{0}` is already registered")]
    DuplicateAccount(String),
}

impl ProvisionError {
    /// Whether this error must stop the whole process rather than one account.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Registry(_))
    }

    pub(crate) fn filesystem(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Filesystem {
            action,
            path,
            source,
        }
    }
}

/// Failure fetching an account's key blob.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server responded with {0}")]
    Status(reqwest::StatusCode),

    #[error("reading response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Failure submitting host metrics.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with {0}")]
    Status(reqwest::StatusCode),
}
