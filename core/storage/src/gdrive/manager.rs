//! Credential lifecycle: load, validate, refresh, or interactively mint.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use drivedrop_common::Result;

use crate::provider::{CreatedFile, DriveApi, FileMetadata, MediaPayload};

use super::auth::{AuthManager, Authorizer};
use super::client::DriveClient;
use super::config::GDriveConfig;
use super::credentials::{Credentials, TokenStore};

/// Connection state of a [`CredentialManager`].
#[derive(Debug, Clone)]
pub enum ConnectionState {
    /// `initialize` has not run yet.
    Uninitialized,
    /// A valid credential is held.
    Connected(Credentials),
    /// No usable credential. Only a restart leaves this state.
    Disconnected,
}

/// Handle to the remote API bound to the current access token.
#[derive(Clone)]
pub struct ServiceHandle {
    api: Arc<dyn DriveApi>,
    access_token: String,
}

impl ServiceHandle {
    /// Name of the backend behind this handle.
    pub fn backend(&self) -> &str {
        self.api.name()
    }

    /// Issue one create-file request.
    pub async fn create_file(
        &self,
        metadata: &FileMetadata,
        media: &MediaPayload,
    ) -> Result<CreatedFile> {
        self.api
            .create_file(&self.access_token, metadata, media)
            .await
    }
}

/// Owner of the process-wide credential.
///
/// The credential is never handed out by reference; callers get a
/// [`ServiceHandle`] carrying a copy of the access token. Refreshes are
/// serialized by the internal lock.
pub struct CredentialManager {
    store: TokenStore,
    scopes: Vec<String>,
    authorizer: Arc<dyn Authorizer>,
    api: Arc<dyn DriveApi>,
    state: RwLock<ConnectionState>,
}

impl CredentialManager {
    /// Create an uninitialized manager.
    pub fn new(
        config: &GDriveConfig,
        authorizer: Arc<dyn Authorizer>,
        api: Arc<dyn DriveApi>,
    ) -> Self {
        Self {
            store: TokenStore::new(&config.token_file),
            scopes: config.scopes.clone(),
            authorizer,
            api,
            state: RwLock::new(ConnectionState::Uninitialized),
        }
    }

    /// Create a manager wired to Google's OAuth endpoints and the Drive API.
    pub fn from_config(config: &GDriveConfig) -> Result<Self> {
        let authorizer = Arc::new(AuthManager::new(config)?);
        let api = Arc::new(DriveClient::with_upload_base(&config.upload_base)?);
        Ok(Self::new(config, authorizer, api))
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, ConnectionState::Connected(_))
    }

    /// Establish the connection from the token store, refreshing or
    /// re-authorizing when the stored credential is missing or invalid.
    ///
    /// # Postconditions
    /// - State is `Connected` or `Disconnected`, never `Uninitialized`
    pub async fn initialize(&self) {
        let loaded = self.load_from_store().await;

        let credentials = match loaded {
            Some(credentials) if credentials.valid() => Ok(credentials),
            other => self.refresh_or_create(other).await,
        };

        let next = match credentials {
            Ok(credentials) if credentials.valid() => {
                info!(backend = self.api.name(), "Successfully connected");
                ConnectionState::Connected(credentials)
            }
            Ok(_) => {
                error!("Connection error");
                ConnectionState::Disconnected
            }
            Err(e) => {
                error!(error = %e, "Connection error");
                ConnectionState::Disconnected
            }
        };

        *self.state.write().await = next;
    }

    /// Read the credential from the token store.
    ///
    /// A missing store is expected and yields `None`. An unreadable store is
    /// logged and also yields `None`, so the caller falls back to
    /// re-authorization.
    pub async fn load_from_store(&self) -> Option<Credentials> {
        let path = self.store.path().display();

        match self.store.load().await {
            Ok(Some(credentials)) => {
                info!("Loading credentials from {}", path);
                Some(credentials.with_scopes(&self.scopes))
            }
            Ok(None) => {
                warn!("Token file {} does not exist", path);
                None
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token file {}", path);
                None
            }
        }
    }

    /// Refresh `current` when it is expired and renewable, otherwise run the
    /// interactive flow. The result overwrites the token store.
    ///
    /// # Errors
    /// - `Error::Authorization` if the refresh or the interactive flow fails
    pub async fn refresh_or_create(&self, current: Option<Credentials>) -> Result<Credentials> {
        let credentials = match current {
            Some(credentials) if credentials.refreshable() => {
                info!("Refreshing expired token");
                self.authorizer.refresh(&credentials).await?
            }
            _ => {
                info!("Creating new token");
                self.authorizer.authorize(&self.scopes).await?
            }
        };

        self.persist(&credentials).await;
        Ok(credentials)
    }

    /// Get a handle bound to a non-expired access token.
    ///
    /// An expired credential is refreshed first. Returns `None` when no
    /// valid credential can be produced; callers must then skip the call.
    pub async fn service_handle(&self) -> Option<ServiceHandle> {
        {
            let state = self.state.read().await;
            match &*state {
                ConnectionState::Connected(credentials) if !credentials.expired() => {
                    return self.handle_for(credentials);
                }
                ConnectionState::Connected(_) => {}
                _ => return None,
            }
        }

        let mut state = self.state.write().await;

        // Double-check after acquiring write lock
        let current = match &*state {
            ConnectionState::Connected(credentials) => credentials.clone(),
            _ => return None,
        };
        if !current.expired() {
            return self.handle_for(&current);
        }

        if !current.refreshable() {
            error!("Connection error: access token expired and no refresh token is available");
            *state = ConnectionState::Disconnected;
            return None;
        }

        info!("Refreshing expired token");
        match self.authorizer.refresh(&current).await {
            Ok(credentials) if credentials.valid() => {
                self.persist(&credentials).await;
                let handle = self.handle_for(&credentials);
                *state = ConnectionState::Connected(credentials);
                handle
            }
            Ok(_) => {
                error!("Connection error: refreshed token is not valid");
                *state = ConnectionState::Disconnected;
                None
            }
            Err(e) => {
                error!(error = %e, "Connection error");
                *state = ConnectionState::Disconnected;
                None
            }
        }
    }

    fn handle_for(&self, credentials: &Credentials) -> Option<ServiceHandle> {
        credentials.token.clone().map(|access_token| ServiceHandle {
            api: self.api.clone(),
            access_token,
        })
    }

    /// Write `credentials` to the token store. A failed write keeps the
    /// in-memory credential usable for this process.
    async fn persist(&self, credentials: &Credentials) {
        if let Err(e) = self.store.save(credentials).await {
            error!(
                error = %e,
                path = %self.store.path().display(),
                "Failed to write token file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDrive;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use drivedrop_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn credentials(token: &str, expiry_offset: Duration, refresh: Option<&str>) -> Credentials {
        Credentials {
            token: Some(token.to_string()),
            refresh_token: refresh.map(str::to_string),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![],
            expiry: Some(Utc::now() + expiry_offset),
        }
    }

    /// Authorizer that counts calls and answers from fixed results.
    #[derive(Default)]
    struct FakeAuthorizer {
        refreshes: AtomicUsize,
        authorizations: AtomicUsize,
        fail_refresh: bool,
        fail_authorize: bool,
        refresh_delay_ms: u64,
    }

    #[async_trait]
    impl Authorizer for FakeAuthorizer {
        async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.refresh_delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.refresh_delay_ms)).await;
            }
            if self.fail_refresh {
                return Err(Error::Authorization("invalid_grant".to_string()));
            }
            let mut refreshed = credentials.clone();
            refreshed.token = Some("refreshed".to_string());
            refreshed.expiry = Some(Utc::now() + Duration::hours(1));
            Ok(refreshed)
        }

        async fn authorize(&self, scopes: &[String]) -> Result<Credentials> {
            self.authorizations.fetch_add(1, Ordering::SeqCst);
            if self.fail_authorize {
                return Err(Error::Authorization("credentials.json not found".to_string()));
            }
            let mut minted = credentials("minted", Duration::hours(1), Some("r"));
            minted.scopes = scopes.to_vec();
            Ok(minted)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: TokenStore,
        authorizer: Arc<FakeAuthorizer>,
        manager: CredentialManager,
    }

    fn fixture(authorizer: FakeAuthorizer) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = GDriveConfig {
            token_file: dir.path().join("token.json"),
            ..GDriveConfig::default()
        };
        let authorizer = Arc::new(authorizer);
        let manager =
            CredentialManager::new(&config, authorizer.clone(), Arc::new(MemoryDrive::new()));

        Fixture {
            store: TokenStore::new(&config.token_file),
            _dir: dir,
            authorizer,
            manager,
        }
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let f = fixture(FakeAuthorizer::default());
        assert!(matches!(f.manager.state().await, ConnectionState::Uninitialized));
        assert!(f.manager.service_handle().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_store_loads_none() {
        let f = fixture(FakeAuthorizer::default());
        assert!(f.manager.load_from_store().await.is_none());
    }

    #[tokio::test]
    async fn test_loaded_credentials_take_configured_scopes() {
        let f = fixture(FakeAuthorizer::default());
        let mut stored = credentials("stored", Duration::hours(1), None);
        stored.scopes = vec!["old".to_string()];
        f.store.save(&stored).await.unwrap();

        let loaded = f.manager.load_from_store().await.unwrap();
        assert_eq!(loaded.scopes, GDriveConfig::default().scopes);
    }

    #[tokio::test]
    async fn test_valid_store_connects_without_network() {
        let f = fixture(FakeAuthorizer::default());
        f.store
            .save(&credentials("stored", Duration::hours(1), Some("r")))
            .await
            .unwrap();

        f.manager.initialize().await;

        assert!(f.manager.is_connected().await);
        assert_eq!(f.authorizer.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(f.authorizer.authorizations.load(Ordering::SeqCst), 0);
        assert!(f.manager.service_handle().await.is_some());
    }

    #[tokio::test]
    async fn test_missing_store_runs_interactive_flow_and_persists() {
        let f = fixture(FakeAuthorizer::default());

        f.manager.initialize().await;

        assert!(f.manager.is_connected().await);
        assert_eq!(f.authorizer.authorizations.load(Ordering::SeqCst), 1);
        let persisted = f.store.load().await.unwrap().unwrap();
        assert_eq!(persisted.token.as_deref(), Some("minted"));
        assert_eq!(persisted.scopes, GDriveConfig::default().scopes);
    }

    #[tokio::test]
    async fn test_expired_with_refresh_token_refreshes_instead_of_authorizing() {
        let f = fixture(FakeAuthorizer::default());
        f.store
            .save(&credentials("stale", -Duration::hours(1), Some("r")))
            .await
            .unwrap();

        f.manager.initialize().await;

        assert!(f.manager.is_connected().await);
        assert_eq!(f.authorizer.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(f.authorizer.authorizations.load(Ordering::SeqCst), 0);
        let persisted = f.store.load().await.unwrap().unwrap();
        assert_eq!(persisted.token.as_deref(), Some("refreshed"));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_reauthorizes() {
        let f = fixture(FakeAuthorizer::default());
        f.store
            .save(&credentials("stale", -Duration::hours(1), None))
            .await
            .unwrap();

        f.manager.initialize().await;

        assert!(f.manager.is_connected().await);
        assert_eq!(f.authorizer.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(f.authorizer.authorizations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_store_reauthorizes() {
        let f = fixture(FakeAuthorizer::default());
        std::fs::write(f.store.path(), "{ not json").unwrap();

        f.manager.initialize().await;

        assert!(f.manager.is_connected().await);
        assert_eq!(f.authorizer.authorizations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_authorization_disconnects() {
        let f = fixture(FakeAuthorizer {
            fail_authorize: true,
            ..FakeAuthorizer::default()
        });

        f.manager.initialize().await;

        assert!(matches!(f.manager.state().await, ConnectionState::Disconnected));
        assert!(f.manager.service_handle().await.is_none());
        assert!(f.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_disconnects_without_interactive_flow() {
        let f = fixture(FakeAuthorizer {
            fail_refresh: true,
            ..FakeAuthorizer::default()
        });
        f.store
            .save(&credentials("stale", -Duration::hours(1), Some("r")))
            .await
            .unwrap();

        f.manager.initialize().await;

        assert!(!f.manager.is_connected().await);
        assert_eq!(f.authorizer.authorizations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_service_handle_refreshes_expired_credential() {
        let f = fixture(FakeAuthorizer::default());
        *f.manager.state.write().await =
            ConnectionState::Connected(credentials("stale", -Duration::minutes(1), Some("r")));

        let handle = f.manager.service_handle().await.unwrap();

        assert_eq!(handle.access_token, "refreshed");
        assert_eq!(f.authorizer.refreshes.load(Ordering::SeqCst), 1);
        let persisted = f.store.load().await.unwrap().unwrap();
        assert_eq!(persisted.token.as_deref(), Some("refreshed"));

        // Fresh credential is reused without another refresh
        f.manager.service_handle().await.unwrap();
        assert_eq!(f.authorizer.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_handles_share_one_refresh() {
        let f = fixture(FakeAuthorizer {
            refresh_delay_ms: 50,
            ..FakeAuthorizer::default()
        });
        *f.manager.state.write().await =
            ConnectionState::Connected(credentials("stale", -Duration::minutes(1), Some("r")));
        let manager = Arc::new(f.manager);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.service_handle().await })
            })
            .collect();

        for task in tasks {
            let handle = task.await.unwrap().unwrap();
            assert_eq!(handle.access_token, "refreshed");
        }
        assert_eq!(f.authorizer.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_service_handle_disconnects_when_expired_without_refresh_token() {
        let f = fixture(FakeAuthorizer::default());
        *f.manager.state.write().await =
            ConnectionState::Connected(credentials("stale", -Duration::minutes(1), None));

        assert!(f.manager.service_handle().await.is_none());
        assert!(matches!(f.manager.state().await, ConnectionState::Disconnected));
        assert_eq!(f.authorizer.authorizations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handle_carries_backend() {
        let f = fixture(FakeAuthorizer::default());
        f.manager.initialize().await;

        let handle = f.manager.service_handle().await.unwrap();
        assert_eq!(handle.backend(), "memory");
    }
}
