//! Common utilities and types shared across drivedrop crates.
//!
//! This module holds the error taxonomy used by the storage backend and the
//! HTTP boundary, plus the small values that flow between them.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FileId, UploadRequest};
