//! HTTP-facing error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Messages per field name. Errors that concern the payload as a whole are
/// reported under `non_field_errors`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Key for errors not tied to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Errors surfaced by the upload endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request fields are missing or malformed.
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    /// The body could not be parsed in its declared format.
    #[error("{0}")]
    Parse(String),

    /// The body's content type is not accepted.
    #[error("Unsupported media type \"{0}\" in request.")]
    UnsupportedMediaType(String),

    /// The gateway could not create the file.
    #[error("File upload failed: {0}")]
    Upload(#[from] drivedrop_common::Error),
}

impl ApiError {
    /// Single-field validation failure.
    pub fn field(name: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_string(), vec![message.to_string()]);
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::Parse(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::UnsupportedMediaType(media_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(json!({
                    "detail": format!("Unsupported media type \"{}\" in request.", media_type)
                })),
            )
                .into_response(),
            ApiError::Upload(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "File upload failed" })),
            )
                .into_response(),
        }
    }
}
