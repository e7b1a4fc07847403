//! HTTP boundary for drivedrop.
//!
//! Exposes the text upload endpoint on top of an [`UploadGateway`].
//!
//! [`UploadGateway`]: drivedrop_storage::UploadGateway

pub mod error;
pub mod handlers;
pub mod state;
pub mod validation;

use axum::routing::post;
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, FieldErrors};
pub use state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload/", post(handlers::upload_text))
        .route("/create-document/", post(handlers::upload_text))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "Serving uploads");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
