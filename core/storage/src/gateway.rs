//! Text upload gateway.

use std::sync::Arc;
use tracing::{error, info};

use drivedrop_common::{Error, FileId, Result, UploadRequest};

use crate::gdrive::CredentialManager;
use crate::provider::{FileMetadata, MediaPayload};

/// Turns a (name, content) pair into exactly one remote file.
pub struct UploadGateway {
    credentials: Arc<CredentialManager>,
}

impl UploadGateway {
    pub fn new(credentials: Arc<CredentialManager>) -> Self {
        Self { credentials }
    }

    /// Upload `content` as a `text/plain` file named `name`.
    ///
    /// # Postconditions
    /// - On success exactly one file exists remotely and its ID is returned
    /// - On failure no file was created by this call
    ///
    /// # Errors
    /// - `Error::ServiceUnavailable` if there is no valid credential; no
    ///   request is sent
    /// - `Error::Upload` if the service rejects the request or answers without an ID
    pub async fn upload_text_file(
        &self,
        name: &str,
        content: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<FileId> {
        let Some(service) = self.credentials.service_handle().await else {
            error!(file_name = %name, "Service not initialized");
            return Err(Error::ServiceUnavailable(
                "Service not initialized".to_string(),
            ));
        };

        let metadata = FileMetadata::new(name, parent_folder_id);
        let media = MediaPayload::text(content);

        let created = service.create_file(&metadata, &media).await.map_err(|e| {
            error!(file_name = %name, error = %e, "An error occurred");
            match e {
                Error::Upload(_) => e,
                other => Error::Upload(other.to_string()),
            }
        })?;

        let file_id = created
            .id
            .ok_or_else(|| Error::Upload("No file ID returned".to_string()))
            .and_then(FileId::new)
            .map_err(|e| {
                error!(file_name = %name, "File upload failed: No file ID returned");
                Error::Upload(e.to_string())
            })?;

        info!(
            backend = service.backend(),
            file_name = %name,
            file_id = %file_id,
            "File created with ID: {}",
            file_id
        );
        Ok(file_id)
    }

    /// Upload a validated request.
    pub async fn upload(
        &self,
        request: &UploadRequest,
        parent_folder_id: Option<&str>,
    ) -> Result<FileId> {
        self.upload_text_file(&request.name, &request.content, parent_folder_id)
            .await
    }
}
