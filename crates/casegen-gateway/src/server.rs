use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use casegen_core::{AppContext, Catalog, Orchestrator};
use casegen_llm::AnyProvider;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

const DEFAULT_MAX_BODY_SIZE: usize = 11 * 1024 * 1024;

#[derive(Clone)]
pub(crate) struct AppState {
    pub orchestrator: Arc<Orchestrator<AnyProvider>>,
    pub catalog: Arc<Catalog>,
    pub started_at: Instant,
}

impl AppState {
    pub(crate) fn new(ctx: &AppContext) -> Self {
        Self {
            orchestrator: Arc::clone(&ctx.orchestrator),
            catalog: Arc::clone(&ctx.catalog),
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        ctx: &AppContext,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, uploads are accepted from any host");
        }

        Self {
            addr,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            state: AppState::new(ctx),
            shutdown_rx,
        }
    }

    /// Cap on the raw request body, multipart framing included.
    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Start the HTTP gateway server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let router = build_router(self.state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("gateway listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("gateway shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}
