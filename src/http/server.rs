//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request id, tracing, timeout, body limit, gate)
//! - Bind server to a plain or TLS listener
//! - Apply gate configuration reloads
//! - Run the rate limit sweeper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::{competitions, health, registrations, ApiState};
use crate::config::PortalConfig;
use crate::http::middleware::{gate_middleware, metrics_middleware};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::security::gate::RequestGate;
use crate::security::session::IdentityProvider;
use crate::store::Store;

/// HTTP server for the competition portal.
pub struct HttpServer {
    router: Router,
    config: PortalConfig,
    gate: Arc<RequestGate>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and backends.
    pub fn new(config: PortalConfig, store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>) -> Self {
        let gate = Arc::new(RequestGate::new(&config.gate, identity));
        Self::with_gate(config, store, gate)
    }

    /// Create a server around an existing gate.
    pub fn with_gate(config: PortalConfig, store: Arc<dyn Store>, gate: Arc<RequestGate>) -> Self {
        let router = Self::build_router(&config, ApiState::new(store), gate.clone());
        Self { router, config, gate }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &PortalConfig, state: ApiState, gate: Arc<RequestGate>) -> Router {
        Router::new()
            .route("/health", get(health::health))
            .route(
                "/api/competitions",
                get(competitions::list_competitions).post(competitions::create_competition),
            )
            .route("/api/competitions/register", post(registrations::register))
            .route(
                "/api/competitions/{id}",
                get(competitions::get_competition)
                    .put(competitions::update_competition)
                    .delete(competitions::delete_competition),
            )
            .route("/api/registrations", get(registrations::list_registrations))
            .route("/api/registrations/{id}/approve", put(registrations::approve))
            .fallback(health::not_found)
            .with_state(state)
            .layer(middleware::from_fn_with_state(gate, gate_middleware))
            .layer(RequestBodyLimitLayer::new(config.server.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(middleware::from_fn(metrics_middleware))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Run the server on a plain TCP listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<PortalConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_background(config_updates, shutdown.resubscribe());

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS until shutdown.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<PortalConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_background(config_updates, shutdown.resubscribe());

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    fn spawn_background(
        &self,
        mut config_updates: mpsc::UnboundedReceiver<PortalConfig>,
        shutdown: broadcast::Receiver<()>,
    ) {
        let gate = self.gate.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                gate.reload(&config.gate);
            }
        });

        let sweep_secs = self.config.gate.rate_limit.sweep_interval_secs;
        if sweep_secs > 0 {
            let limiter = self.gate.limiter().clone();
            tokio::spawn(limiter.run_sweeper(Duration::from_secs(sweep_secs), shutdown));
        }
    }
}
