//! OAuth2 authorization and token refresh for Google Drive.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    TokenResponse, TokenUrl,
};
use std::path::PathBuf;
use tracing::{info, warn};

use drivedrop_common::{Error, Result};

use super::callback::CallbackListener;
use super::config::GDriveConfig;
use super::credentials::Credentials;
use super::secrets::{ClientSecrets, GOOGLE_AUTH_URL};

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Source of new credentials.
///
/// The credential manager decides *when* to refresh or re-authorize; an
/// `Authorizer` only knows *how*.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Exchange the refresh token of `credentials` for a new access token.
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials>;

    /// Run the interactive flow and mint a fresh credential for `scopes`.
    ///
    /// Blocks until the operator completes the browser flow or the
    /// configured wait elapses.
    async fn authorize(&self, scopes: &[String]) -> Result<Credentials>;
}

/// Interactive flow that has been started but not yet completed.
pub struct PendingAuthorization {
    /// URL the operator must visit.
    pub url: String,
    client: GoogleClient,
    secrets: ClientSecrets,
    csrf_token: CsrfToken,
    pkce_verifier: PkceCodeVerifier,
    listener: CallbackListener,
    scopes: Vec<String>,
}

/// OAuth2 installed-application flow against Google's endpoints.
pub struct AuthManager {
    credentials_file: PathBuf,
    timeout: std::time::Duration,
    open_browser: bool,
    http: oauth2::reqwest::Client,
}

impl AuthManager {
    /// Create a new authentication manager.
    pub fn new(config: &GDriveConfig) -> Result<Self> {
        // The token endpoint must not be followed through redirects.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            credentials_file: config.credentials_file.clone(),
            timeout: config.auth_timeout(),
            open_browser: config.open_browser,
            http,
        })
    }

    /// Bind the callback listener and build the authorization URL.
    ///
    /// # Errors
    /// - Client secrets file missing or malformed
    /// - Listener cannot be bound
    pub async fn start_authorization(&self, scopes: &[String]) -> Result<PendingAuthorization> {
        let secrets = ClientSecrets::load(&self.credentials_file).await?;
        let listener = CallbackListener::bind().await?;

        let client = google_client(&secrets.client_id, &secrets.client_secret, &secrets.auth_uri, &secrets.token_uri)?
            .set_redirect_uri(
                RedirectUrl::new(listener.redirect_uri())
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            );

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        Ok(PendingAuthorization {
            url: url.to_string(),
            client,
            secrets,
            csrf_token,
            pkce_verifier,
            listener,
            scopes: scopes.to_vec(),
        })
    }

    /// Wait for the callback and exchange its code for credentials.
    ///
    /// # Errors
    /// - Operator denied access, state mismatch, or the wait timed out
    /// - Token exchange failed
    pub async fn finish_authorization(&self, pending: PendingAuthorization) -> Result<Credentials> {
        let code = pending
            .listener
            .wait_for_code(pending.csrf_token.secret(), self.timeout)
            .await?;

        let token = pending
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pending.pkce_verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authorization(format!("Token exchange failed: {}", e)))?;

        let template = Credentials {
            token: None,
            refresh_token: None,
            token_uri: pending.secrets.token_uri,
            client_id: pending.secrets.client_id,
            client_secret: pending.secrets.client_secret,
            scopes: pending.scopes,
            expiry: None,
        };

        Ok(apply_token_response(template, &token))
    }
}

#[async_trait]
impl Authorizer for AuthManager {
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        let refresh_token = credentials.refresh_token.as_deref().ok_or_else(|| {
            Error::Authorization("Credential has no refresh token".to_string())
        })?;

        let client = google_client(
            &credentials.client_id,
            &credentials.client_secret,
            GOOGLE_AUTH_URL,
            &credentials.token_uri,
        )?;

        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authorization(format!("Token refresh failed: {}", e)))?;

        Ok(apply_token_response(credentials.clone(), &token))
    }

    async fn authorize(&self, scopes: &[String]) -> Result<Credentials> {
        let pending = self.start_authorization(scopes).await?;

        info!(
            url = %pending.url,
            "Please visit this URL to authorize this application"
        );

        if self.open_browser {
            if let Err(e) = open::that(&pending.url) {
                warn!(error = %e, "Could not open a browser, visit the URL manually");
            }
        }

        self.finish_authorization(pending).await
    }
}

fn google_client(
    client_id: &str,
    client_secret: &str,
    auth_uri: &str,
    token_uri: &str,
) -> Result<GoogleClient> {
    Ok(BasicClient::new(ClientId::new(client_id.to_string()))
        .set_client_secret(ClientSecret::new(client_secret.to_string()))
        .set_auth_uri(
            AuthUrl::new(auth_uri.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
        )
        .set_token_uri(
            TokenUrl::new(token_uri.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
        )
        // Google expects client credentials in the form body.
        .set_auth_type(AuthType::RequestBody))
}

/// Fold a token endpoint response into `credentials`.
///
/// Refresh responses usually omit the refresh token, in which case the
/// previous one is kept.
fn apply_token_response(mut credentials: Credentials, token: &BasicTokenResponse) -> Credentials {
    credentials.token = Some(token.access_token().secret().clone());

    if let Some(refresh_token) = token.refresh_token() {
        credentials.refresh_token = Some(refresh_token.secret().clone());
    }

    let expires_in = token
        .expires_in()
        .unwrap_or_else(|| std::time::Duration::from_secs(3600));
    credentials.expiry =
        Some(Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1)));

    if let Some(scopes) = token.scopes() {
        credentials.scopes = scopes.iter().map(|s| s.to_string()).collect();
    }

    credentials
}
