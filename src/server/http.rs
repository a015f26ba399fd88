//! HTTP server: binds a listener and serves the chat routes

use crate::auth::{AccessEvaluator, AdminKey, Authenticator};
use crate::chats::ChatService;
use crate::server::routes::{create_router, AppState};
use crate::storage::MessageStore;

use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Chatter server configuration
pub struct ChatterServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Secret for signing session tokens
    pub token_secret: Vec<u8>,
    /// Admin key for full access
    pub admin_key: Option<AdminKey>,
}

/// The chat relay server
pub struct ChatterServer {
    bind_addr: SocketAddr,
    state: AppState,
}

impl ChatterServer {
    pub fn new(
        config: ChatterServerConfig,
        store: Arc<dyn MessageStore>,
        evaluator: Arc<dyn AccessEvaluator>,
    ) -> Result<Self> {
        let chats = ChatService::new(store, evaluator).context("Failed to build chat service")?;
        let authenticator = Authenticator::new(config.token_secret, config.admin_key);

        Ok(Self {
            bind_addr: config.bind_addr,
            state: AppState {
                chats: Arc::new(chats),
                authenticator: Arc::new(authenticator),
            },
        })
    }

    /// The routes, for serving elsewhere or driving directly in tests
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind_addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, "Chatter server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Chatter server stopped");
        Ok(())
    }
}
