//! Google Drive API client.

use async_trait::async_trait;
use reqwest::{header, Client};
use uuid::Uuid;

use drivedrop_common::{Error, Result};

use crate::provider::{CreatedFile, DriveApi, FileMetadata, MediaPayload};

/// Google Drive API client.
///
/// Holds no credentials of its own; the access token is supplied per call
/// by the service handle.
pub struct DriveClient {
    http: Client,
    upload_base: String,
}

impl DriveClient {
    /// Create a client against `upload_base`, normally [`DRIVE_UPLOAD_BASE`].
    ///
    /// [`DRIVE_UPLOAD_BASE`]: super::config::DRIVE_UPLOAD_BASE
    pub fn with_upload_base(upload_base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("drivedrop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            upload_base: upload_base.into(),
        })
    }
}

/// Build a `multipart/related` body: JSON metadata, then the media part.
fn multipart_body(
    boundary: &str,
    metadata: &FileMetadata,
    media: &MediaPayload,
) -> Result<Vec<u8>> {
    let metadata_json = serde_json::to_string(metadata)?;

    let mut body = Vec::with_capacity(metadata_json.len() + media.data.len() + 256);

    // Metadata part
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    // Media part
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", media.mime_type).as_bytes());
    body.extend_from_slice(&media.data);
    body.extend_from_slice(b"\r\n");

    // End boundary
    body.extend_from_slice(format!("--{}--", boundary).as_bytes());

    Ok(body)
}

#[async_trait]
impl DriveApi for DriveClient {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn create_file(
        &self,
        access_token: &str,
        metadata: &FileMetadata,
        media: &MediaPayload,
    ) -> Result<CreatedFile> {
        let url = format!("{}/files", self.upload_base);
        let boundary = format!("drivedrop_{}", Uuid::new_v4().simple());
        let body = multipart_body(&boundary, metadata, media)?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upload(format!("API error: {} - {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upload(format!("Failed to parse upload response: {}", e)))
    }
}
