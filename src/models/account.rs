use serde::{Deserialize, Serialize};

/// A local system account bound to a ServerAuth credential key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    /// Per-account API key issued by the ServerAuth control panel.
    #[serde(rename = "apikey")]
    pub credential_key: String,
}

impl Account {
    pub fn new(username: impl Into<String>, credential_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential_key: credential_key.into(),
        }
    }
}

/// Shorten a secret for display and logs, keeping only a short prefix.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if prefix.len() == secret.len() {
        return "****".to_string();
    }
    format!("{}****", prefix)
}
