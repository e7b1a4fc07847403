//! OAuth2 credentials and their durable token store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use drivedrop_common::{Error, Result};

/// Default OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Access tokens this close to expiry count as expired.
const EXPIRY_SKEW_MINUTES: i64 = 5;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// Token bundle in Google's "authorized user" format.
///
/// This is what the token store holds, so the file stays readable by other
/// Google client libraries.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access token for API requests.
    pub token: Option<String>,
    /// Refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Endpoint used to refresh this credential.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, deserialize_with = "deserialize_scopes")]
    pub scopes: Vec<String>,
    /// When the access token expires. Never expires when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Check if the access token is expired or about to expire.
    pub fn expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => expiry < Utc::now() + Duration::minutes(EXPIRY_SKEW_MINUTES),
            None => false,
        }
    }

    /// An access token is present and not expired.
    pub fn valid(&self) -> bool {
        self.token.is_some() && !self.expired()
    }

    /// Expired, but renewable without operator involvement.
    pub fn refreshable(&self) -> bool {
        self.expired() && self.refresh_token.is_some()
    }

    /// Replace the recorded scopes, unless `scopes` is empty.
    pub fn with_scopes(mut self, scopes: &[String]) -> Self {
        if !scopes.is_empty() {
            self.scopes = scopes.to_vec();
        }
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Scopes are written as a list but older files carry one space-separated string.
fn deserialize_scopes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScopeList {
        Joined(String),
        Split(Vec<String>),
    }

    Ok(match Option::<ScopeList>::deserialize(deserializer)? {
        Some(ScopeList::Joined(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(ScopeList::Split(v)) => v,
        None => Vec::new(),
    })
}

/// File-backed slot holding the current serialized credential.
///
/// There is no locking: two processes refreshing the same store race and
/// the last writer wins.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credential.
    ///
    /// # Returns
    /// - `Ok(None)` if the store does not exist
    ///
    /// # Errors
    /// - The store exists but cannot be read or parsed
    pub async fn load(&self) -> Result<Option<Credentials>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credentials = serde_json::from_str(&raw).map_err(|e| {
            Error::Serialization(format!(
                "Invalid token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(credentials))
    }

    /// Overwrite the store with `credentials`.
    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_string(credentials)?;
        fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> Credentials {
        Credentials {
            token: Some("access".to_string()),
            refresh_token: refresh.map(str::to_string),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![],
            expiry,
        }
    }

    #[test]
    fn test_credentials_expiration() {
        let expired = credentials(Some(Utc::now() - Duration::hours(1)), Some("r"));
        assert!(expired.expired());
        assert!(!expired.valid());
        assert!(expired.refreshable());

        let fresh = credentials(Some(Utc::now() + Duration::hours(1)), Some("r"));
        assert!(!fresh.expired());
        assert!(fresh.valid());
        assert!(!fresh.refreshable());
    }

    #[test]
    fn test_credentials_near_expiration() {
        // 4 minutes left is inside the 5 minute skew
        let creds = credentials(Some(Utc::now() + Duration::minutes(4)), None);
        assert!(creds.expired());
        assert!(!creds.refreshable());
    }

    #[test]
    fn test_credentials_without_expiry_never_expire() {
        let creds = credentials(None, None);
        assert!(!creds.expired());
        assert!(creds.valid());
    }

    #[test]
    fn test_missing_token_is_invalid() {
        let mut creds = credentials(None, Some("r"));
        creds.token = None;
        assert!(!creds.valid());
    }

    #[test]
    fn test_parses_authorized_user_file() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "GOCSPX",
            "scopes": ["https://www.googleapis.com/auth/drive.file"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2030-01-01T00:00:00.123456Z"
        }"#;

        let creds: Credentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.token.as_deref(), Some("ya29.a0"));
        assert_eq!(creds.scopes.len(), 1);
        assert!(creds.valid());
    }

    #[test]
    fn test_parses_space_separated_scopes() {
        let json = r#"{"token": null, "client_id": "a", "client_secret": "b", "scopes": "s1 s2"}"#;
        let creds: Credentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds.scopes, vec!["s1", "s2"]);
        assert_eq!(creds.token_uri, GOOGLE_TOKEN_URL);
        assert!(creds.expiry.is_none());
    }

    #[test]
    fn test_with_scopes_keeps_recorded_when_empty() {
        let mut creds = credentials(None, None);
        creds.scopes = vec!["recorded".to_string()];

        let kept = creds.clone().with_scopes(&[]);
        assert_eq!(kept.scopes, vec!["recorded"]);

        let replaced = creds.with_scopes(&["configured".to_string()]);
        assert_eq!(replaced.scopes, vec!["configured"]);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let creds = credentials(None, Some("refresh-secret"));
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("access"));
        assert!(!printed.contains("refresh-secret"));
        assert!(!printed.contains("secret\""));
    }

    #[tokio::test]
    async fn test_store_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let creds = credentials(Some(Utc::now() + Duration::hours(1)), Some("r"));

        store.save(&creds).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.token, creds.token);
        assert_eq!(loaded.refresh_token, creds.refresh_token);
        assert_eq!(loaded.client_id, creds.client_id);
    }

    #[tokio::test]
    async fn test_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();

        let store = TokenStore::new(path);
        assert!(matches!(store.load().await, Err(Error::Serialization(_))));
    }
}
