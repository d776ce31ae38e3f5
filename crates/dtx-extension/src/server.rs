//! Extension server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{ExtensionError, ExtensionResult};
use crate::routes::create_router;
use crate::state::AppState;

/// HTTP server exposing the webhooks and actions.
#[derive(Debug, Clone)]
pub struct ExtensionServer {
    state: Arc<AppState>,
}

impl ExtensionServer {
    /// Create a server around the given state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Get the shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Start the server and listen for connections.
    ///
    /// Runs until the server encounters a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self, addr: SocketAddr) -> ExtensionResult<()> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server shuts down when `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> ExtensionResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ExtensionError::BindFailed(addr, e))?;

        info!(addr = %addr, "Extension server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ExtensionError::Serve)?;

        info!("Extension server shut down");
        Ok(())
    }

    /// Get the router, for embedding or testing.
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}
