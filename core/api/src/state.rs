//! Shared application state.

use std::sync::Arc;

use drivedrop_storage::UploadGateway;

/// State shared by every request handler.
///
/// Built once at startup so all requests go through the same credential
/// manager instead of re-authorizing per request.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<UploadGateway>,
    /// Destination folder for uploads, when configured.
    pub folder_id: Option<String>,
}

impl AppState {
    pub fn new(gateway: Arc<UploadGateway>, folder_id: Option<String>) -> Self {
        Self { gateway, folder_id }
    }
}
