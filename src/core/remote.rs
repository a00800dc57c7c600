//! ServerAuth HTTP API client.
//!
//! Two calls: fetching an account's managed key file, and posting host
//! metrics. Both use a blocking client with a fixed 10 second timeout and
//! never retry.

use crate::constants;
use crate::core::error::{FetchError, SubmitError};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Identity components addressing one account's key file.
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    /// Base URL ending in `/`.
    pub base_url: &'a str,
    pub organization_id: &'a str,
    pub server_api_key: &'a str,
    pub account_api_key: &'a str,
}

impl KeyRequest<'_> {
    pub fn url(&self) -> String {
        key_url(
            self.base_url,
            self.organization_id,
            self.server_api_key,
            self.account_api_key,
        )
    }
}

/// Source of authorized-key blobs.
pub trait KeySource {
    fn fetch(&self, request: &KeyRequest<'_>) -> Result<String, FetchError>;
}

/// `{base}keys/{org}/{server_key}/{account_key}`
pub fn key_url(base_url: &str, organization_id: &str, server_api_key: &str, account_api_key: &str) -> String {
    format!(
        "{}keys/{}/{}/{}",
        base_url, organization_id, server_api_key, account_api_key
    )
}

pub fn monitoring_url(base_url: &str) -> String {
    format!("{}monitoring", base_url)
}

/// `ServerAuthAgent-v2.0.0;linux`
pub fn user_agent() -> String {
    format!(
        "ServerAuthAgent-v{};{}",
        constants::AGENT_VERSION,
        std::env::consts::OS
    )
}

pub struct ApiClient {
    http: Client,
}

impl ApiClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    /// POST url-encoded metrics to `{base}monitoring`. The response body is ignored.
    pub fn submit_metrics(
        &self,
        base_url: &str,
        team_api_key: &str,
        server_api_key: &str,
        form: &[(String, String)],
    ) -> Result<(), SubmitError> {
        let url = monitoring_url(base_url);
        debug!(%url, fields = form.len(), "submitting metrics");
        let resp = self
            .http
            .post(&url)
            .header("TeamApiKey", team_api_key)
            .header("ServerApiKey", server_api_key)
            .form(form)
            .send()?;
        if !resp.status().is_success() {
            return Err(SubmitError::Status(resp.status()));
        }
        Ok(())
    }
}

impl KeySource for ApiClient {
    fn fetch(&self, request: &KeyRequest<'_>) -> Result<String, FetchError> {
        let url = request.url();
        info!(
            url = %key_url(
                request.base_url,
                request.organization_id,
                "<server-key>",
                "<account-key>"
            ),
            "fetching keys"
        );
        let resp = self.http.get(&url).send().map_err(FetchError::Transport)?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }
        resp.text().map_err(FetchError::Body)
    }
}
