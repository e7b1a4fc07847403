//! Request handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{read_body, validate_upload};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: String,
}

/// `POST /upload/`: store the `data` field as a text file called `name`.
pub async fn upload_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let fields = read_body(&headers, body).await?;
    let request = validate_upload(&fields)?;

    let file_id = state
        .gateway
        .upload(&request, state.folder_id.as_deref())
        .await
        .map_err(|e| {
            error!(file_name = %request.name, error = %e, "File upload failed");
            ApiError::Upload(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File upload success".to_string(),
            file_id: file_id.into_inner(),
        }),
    ))
}
