//! Google Drive backend for drivedrop.
//!
//! This module provides:
//! - OAuth2 installed-app authorization with a local callback listener
//! - Token store persistence in Google's authorized-user format
//! - Credential lifecycle management with on-demand refresh
//! - A Drive client issuing single multipart create requests

pub mod auth;
pub mod callback;
pub mod client;
pub mod config;
pub mod credentials;
pub mod manager;
pub mod secrets;

pub use auth::{AuthManager, Authorizer, PendingAuthorization};
pub use callback::CallbackListener;
pub use client::DriveClient;
pub use config::GDriveConfig;
pub use credentials::{Credentials, TokenStore};
pub use manager::{ConnectionState, CredentialManager, ServiceHandle};
pub use secrets::ClientSecrets;
