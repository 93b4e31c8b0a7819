//! HTTP server for Token Wheel.

pub mod error;
pub mod logging;
pub mod routes;

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokenwheel_application::TokenWheelUseCase;
use tokenwheel_core::config::WheelConfig;
use tokenwheel_infrastructure::OracleRegistry;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use routes::AppState;

/// Token Wheel server: configured registry, use case and router.
pub struct TokenWheelServer {
    config: WheelConfig,
    registry: Arc<OracleRegistry>,
    usecase: Arc<TokenWheelUseCase>,
}

impl TokenWheelServer {
    /// Builds the oracle registry and use case from `config`. Nothing is loaded yet.
    pub fn new(config: WheelConfig) -> Self {
        let registry = Arc::new(OracleRegistry::from_config(&config));
        Self::with_registry(config, registry)
    }

    /// Uses an existing registry instead of one built from `config.models`.
    pub fn with_registry(config: WheelConfig, registry: Arc<OracleRegistry>) -> Self {
        let usecase = Arc::new(TokenWheelUseCase::new(
            registry.clone(),
            config.sampling.clone(),
            config.sessions.clone(),
        ));
        Self {
            config,
            registry,
            usecase,
        }
    }

    /// Create the application router with all routes and middleware
    pub fn create_app(&self) -> Router {
        routes::router(AppState {
            usecase: self.usecase.clone(),
        })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
    }

    /// Preloads models, starts the expiry sweeper and serves until `shutdown` is cancelled.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        let loaded = self.registry.preload(&self.config.preload).await;
        tracing::info!(
            loaded,
            requested = self.config.preload.len(),
            "Model preload finished"
        );

        let sweeper = self.usecase.start_expiry_sweeper(shutdown.clone());

        let app = self.create_app();
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        tracing::info!(addr = %addr, "Starting Token Wheel server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await?;

        shutdown.cancel();
        sweeper.await?;
        tracing::info!("Token Wheel server stopped");
        Ok(())
    }
}
