//! Google Drive backend configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Google Drive upload API base URL.
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
/// Scope granting access to files created by this application.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// How long the interactive flow waits for the browser callback by default.
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;

/// Google Drive backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GDriveConfig {
    /// Token store holding the serialized credential.
    pub token_file: PathBuf,
    /// OAuth client secrets downloaded from the Google Cloud console.
    pub credentials_file: PathBuf,
    /// OAuth scopes requested during authorization.
    pub scopes: Vec<String>,
    /// Destination folder for uploads. Drive root when absent.
    pub folder_id: Option<String>,
    /// Bounded wait for the interactive authorization callback, in seconds.
    pub auth_timeout_secs: u64,
    /// Launch the authorization URL in the default browser.
    pub open_browser: bool,
    /// Drive upload API base URL.
    pub upload_base: String,
}

impl GDriveConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    /// Split a scope list given as one string on commas or whitespace.
    pub fn parse_scopes(raw: &str) -> Vec<String> {
        raw.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for GDriveConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("token.json"),
            credentials_file: PathBuf::from("credentials.json"),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            folder_id: None,
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            open_browser: true,
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }
}
