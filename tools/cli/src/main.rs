//! drivedrop - store text payloads as Google Drive files over HTTP.
//!
//! The `serve` command runs the upload endpoint; `authorize` only
//! establishes the Google credential and writes the token store.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use drivedrop_api::AppState;
use drivedrop_storage::gdrive::config::DRIVE_FILE_SCOPE;
use drivedrop_storage::{CredentialManager, GDriveConfig, UploadGateway};

#[derive(Parser)]
#[command(name = "drivedrop")]
#[command(about = "drivedrop - Upload text files to Google Drive")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    drive: DriveArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DriveArgs {
    /// Token store holding the serialized credential.
    #[arg(long, env = "GOOGLE_TOKEN_FILE", default_value = "token.json", global = true)]
    token_file: PathBuf,

    /// OAuth client secrets file.
    #[arg(long, env = "GOOGLE_CREDENTIALS_FILE", default_value = "credentials.json", global = true)]
    credentials_file: PathBuf,

    /// OAuth scopes, separated by commas or whitespace.
    #[arg(long, env = "GOOGLE_SCOPES", default_value = DRIVE_FILE_SCOPE, global = true)]
    scopes: String,

    /// Destination folder ID for uploads.
    #[arg(long, env = "GOOGLE_FOLDER_ID", global = true)]
    folder_id: Option<String>,

    /// Seconds to wait for the browser authorization callback.
    #[arg(long, env = "DRIVEDROP_AUTH_TIMEOUT_SECS", default_value_t = 300, global = true)]
    auth_timeout_secs: u64,

    /// Print the authorization URL instead of opening a browser.
    #[arg(long, global = true)]
    no_browser: bool,
}

impl DriveArgs {
    fn into_config(self) -> GDriveConfig {
        GDriveConfig {
            token_file: self.token_file,
            credentials_file: self.credentials_file,
            scopes: GDriveConfig::parse_scopes(&self.scopes),
            folder_id: self.folder_id.filter(|id| !id.is_empty()),
            auth_timeout_secs: self.auth_timeout_secs,
            open_browser: !self.no_browser,
            ..GDriveConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the upload endpoint.
    Serve {
        /// Address to listen on.
        #[arg(short, long, env = "DRIVEDROP_ADDR", default_value = "127.0.0.1:8000")]
        addr: String,
    },

    /// Obtain and store a Google Drive credential, then exit.
    Authorize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.drive.into_config();

    match cli.command {
        Commands::Serve { addr } => cmd_serve(config, &addr).await,
        Commands::Authorize => cmd_authorize(config).await,
    }
}

/// Initialize credentials and serve HTTP until Ctrl-C.
async fn cmd_serve(config: GDriveConfig, addr: &str) -> Result<()> {
    let manager = Arc::new(
        CredentialManager::from_config(&config).context("Failed to set up Google Drive client")?,
    );
    manager.initialize().await;

    if !manager.is_connected().await {
        warn!("Starting without a Google Drive connection, uploads will fail");
    }

    let state = AppState::new(
        Arc::new(UploadGateway::new(manager)),
        config.folder_id.clone(),
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    drivedrop_api::serve(listener, state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

/// Run the credential lifecycle once and report the outcome.
async fn cmd_authorize(config: GDriveConfig) -> Result<()> {
    let manager =
        CredentialManager::from_config(&config).context("Failed to set up Google Drive client")?;
    manager.initialize().await;

    if !manager.is_connected().await {
        anyhow::bail!("Authorization failed, see the log for details");
    }

    println!(
        "Connected. Credentials stored in {}",
        manager.token_store().path().display()
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
