//! Remote file API trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use drivedrop_common::Result;

/// MIME type used for every text upload.
pub const TEXT_PLAIN: &str = "text/plain";

/// Metadata sent with a create-file request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Name of the file to create.
    pub name: String,
    /// Parent folder IDs. Omitted from the request when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl FileMetadata {
    /// Build metadata for `name`, placed under `parent_id` when one is given.
    pub fn new(name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            name: name.into(),
            parents: parent_id
                .filter(|id| !id.is_empty())
                .map(|id| vec![id.to_string()])
                .unwrap_or_default(),
        }
    }
}

/// Byte-encoded file content plus its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl MediaPayload {
    /// Encode `content` as UTF-8 bytes tagged `text/plain`.
    pub fn text(content: &str) -> Self {
        Self {
            data: content.as_bytes().to_vec(),
            mime_type: TEXT_PLAIN.to_string(),
        }
    }
}

/// The subset of a created file the service asks for (`fields=id`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatedFile {
    #[serde(default)]
    pub id: Option<String>,
}

/// Remote file API used by the upload gateway.
///
/// Implementations perform exactly one create request per call and never
/// retry on their own.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Get the backend name (e.g., "gdrive", "memory").
    fn name(&self) -> &str;

    /// Create a file from metadata and media in a single request.
    ///
    /// # Postconditions
    /// - On success exactly one remote file exists for this call
    ///
    /// # Errors
    /// - `Error::Upload` when the service rejects the request
    /// - `Error::Network` when the request could not be delivered
    async fn create_file(
        &self,
        access_token: &str,
        metadata: &FileMetadata,
        media: &MediaPayload,
    ) -> Result<CreatedFile>;
}
