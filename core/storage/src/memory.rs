//! In-memory Drive backend for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::provider::{CreatedFile, DriveApi, FileMetadata, MediaPayload};
use drivedrop_common::{Error, Result};

/// A create call as seen by the in-memory backend.
#[derive(Debug, Clone)]
pub struct RecordedCreate {
    /// File ID handed back to the caller.
    pub id: String,
    /// Bearer token the call was made with.
    pub access_token: String,
    pub metadata: FileMetadata,
    pub media: MediaPayload,
}

#[derive(Debug, Default)]
struct State {
    created: Vec<RecordedCreate>,
    failure: Option<String>,
    omit_id: bool,
    attempts: usize,
}

/// In-memory Drive backend.
///
/// Useful for testing and development. Every create call is recorded and
/// lost on drop. Can be told to reject calls to simulate API errors.
#[derive(Clone, Default)]
pub struct MemoryDrive {
    state: Arc<Mutex<State>>,
}

impl MemoryDrive {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject every following create call with `detail`.
    pub fn fail_with(&self, detail: impl Into<String>) {
        self.lock().failure = Some(detail.into());
    }

    /// Accept create calls but answer without a file ID.
    pub fn omit_ids(&self) {
        self.lock().omit_id = true;
    }

    /// Successful create calls, in order.
    pub fn created(&self) -> Vec<RecordedCreate> {
        self.lock().created.clone()
    }

    /// Number of create calls received, including rejected ones.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_file(
        &self,
        access_token: &str,
        metadata: &FileMetadata,
        media: &MediaPayload,
    ) -> Result<CreatedFile> {
        let mut state = self.lock();
        state.attempts += 1;

        if let Some(detail) = &state.failure {
            return Err(Error::Upload(detail.clone()));
        }

        if state.omit_id {
            return Ok(CreatedFile { id: None });
        }

        let id = Uuid::new_v4().simple().to_string();
        state.created.push(RecordedCreate {
            id: id.clone(),
            access_token: access_token.to_string(),
            metadata: metadata.clone(),
            media: media.clone(),
        });

        Ok(CreatedFile { id: Some(id) })
    }
}
