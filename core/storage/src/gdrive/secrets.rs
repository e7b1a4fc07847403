//! OAuth client secrets file.

use serde::Deserialize;
use std::path::Path;

use drivedrop_common::{Error, Result};

use super::credentials::GOOGLE_TOKEN_URL;

/// OAuth2 authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// OAuth client registration as downloaded from the Google Cloud console.
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a client secrets document (`installed` or `web` client type).
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(raw)
            .map_err(|e| Error::Authorization(format!("Invalid client secrets: {}", e)))?;

        file.installed.or(file.web).ok_or_else(|| {
            Error::Authorization(
                "Client secrets must contain an \"installed\" or \"web\" client".to_string(),
            )
        })
    }

    /// Load the client secrets file.
    ///
    /// # Errors
    /// - `Error::Authorization` if the file is missing or malformed
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Authorization(format!(
                "Cannot read client secrets file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&raw)
    }
}
