//! Remote storage backend for drivedrop.
//!
//! This module provides a trait-based interface to the remote file API,
//! the Google Drive implementation with its credential lifecycle, and the
//! upload gateway that ties the two together.
//!
//! # Design Principles
//! - One create request per upload, no retries
//! - Credentials are owned by the manager and exposed only via handles
//! - A missing or invalid credential short-circuits before any network I/O

pub mod gateway;
pub mod gdrive;
pub mod memory;
pub mod provider;

pub use gateway::UploadGateway;
pub use gdrive::{CredentialManager, GDriveConfig};
pub use memory::MemoryDrive;
pub use provider::{CreatedFile, DriveApi, FileMetadata, MediaPayload};
