//! Request body parsing and field validation.
//!
//! Three body formats are accepted: JSON objects, URL-encoded forms and
//! multipart forms. All are normalized to a JSON map before the `data` and
//! `name` fields are checked, so the field rules are the same regardless of
//! format.

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap};
use serde_json::{Map, Value};

use drivedrop_common::UploadRequest;

use crate::error::{ApiError, FieldErrors, NON_FIELD_ERRORS};

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_STRING: &str = "Not a valid string.";
const NO_NULL_CHARS: &str = "Null characters are not allowed.";

const MULTIPART_FORM: &str = "multipart/form-data";

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Read the request body into a field map, dispatching on `Content-Type`.
pub async fn read_body(headers: &HeaderMap, body: Bytes) -> Result<Map<String, Value>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    match content_type {
        Some(ct) if !body.is_empty() && media_type(ct) == MULTIPART_FORM => {
            parse_multipart(headers, body).await
        }
        _ => parse_body(content_type, &body),
    }
}

/// Collect the text parts of a multipart form. File parts are skipped.
async fn parse_multipart(headers: &HeaderMap, body: Bytes) -> Result<Map<String, Value>, ApiError> {
    let parse_error = |detail: String| ApiError::Parse(format!("Multipart form parse error - {}", detail));

    let mut request = Request::new(Body::from(body));
    *request.headers_mut() = headers.clone();

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| parse_error(e.body_text()))?;

    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| parse_error(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }

        let text = field.text().await.map_err(|e| parse_error(e.body_text()))?;
        fields.insert(name, Value::String(text));
    }

    Ok(fields)
}

/// Parse `body` according to its declared content type.
///
/// An empty body, or one sent without a content type, parses as an empty map.
///
/// # Errors
/// - `ApiError::UnsupportedMediaType` for anything but JSON or URL-encoded forms
/// - `ApiError::Parse` for malformed JSON
/// - `ApiError::Validation` when JSON is valid but not an object
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    let Some(content_type) = content_type else {
        return Ok(Map::new());
    };
    if body.is_empty() {
        return Ok(Map::new());
    }

    match media_type(content_type).as_str() {
        "application/json" => {
            let value: Value = serde_json::from_slice(body)
                .map_err(|e| ApiError::Parse(format!("JSON parse error - {}", e)))?;

            match value {
                Value::Object(map) => Ok(map),
                other => {
                    let mut errors = FieldErrors::new();
                    errors.insert(
                        NON_FIELD_ERRORS.to_string(),
                        vec![format!(
                            "Invalid data. Expected a dictionary, but got {}.",
                            kind_name(&other)
                        )],
                    );
                    Err(ApiError::Validation(errors))
                }
            }
        }
        "application/x-www-form-urlencoded" => Ok(url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect()),
        other => Err(ApiError::UnsupportedMediaType(other.to_string())),
    }
}

/// Validate the `data` and `name` fields into an upload request.
///
/// Every failing field is reported, not just the first.
pub fn validate_upload(fields: &Map<String, Value>) -> Result<UploadRequest, ApiError> {
    let mut errors = FieldErrors::new();

    let content = char_field(fields, "data", &mut errors);
    let name = char_field(fields, "name", &mut errors);

    match (content, name) {
        (Some(content), Some(name)) if errors.is_empty() => Ok(UploadRequest { name, content }),
        _ => Err(ApiError::Validation(errors)),
    }
}

/// Required, non-null, non-blank string field with surrounding whitespace trimmed.
/// Numbers are accepted as their decimal text.
fn char_field(fields: &Map<String, Value>, key: &str, errors: &mut FieldErrors) -> Option<String> {
    let mut fail = |message: &str| {
        errors
            .entry(key.to_string())
            .or_default()
            .push(message.to_string());
        None
    };

    let raw = match fields.get(key) {
        None => return fail(REQUIRED),
        Some(Value::Null) => return fail(NOT_NULL),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return fail(NOT_STRING),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fail(NOT_BLANK);
    }
    if trimmed.contains('\0') {
        return fail(NO_NULL_CHARS);
    }

    Some(trimmed.to_string())
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
