use crate::config::Settings;
use crate::edge::{
    DeploymentRegistry, EdgeMiddlewareStack, EdgeService, HttpOriginClient, InMemoryEdgeCache,
};
use crate::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    registry: Arc<DeploymentRegistry>,
}

impl Application {
    /// Load settings from the usual sources and build the application
    pub fn new() -> Result<Self> {
        Self::build(Settings::new()?)
    }

    /// Validate every deployment and wire the shared cache and origin client
    #[instrument(skip_all)]
    pub fn build(settings: Settings) -> Result<Self> {
        let cache = Arc::new(InMemoryEdgeCache::new(settings.cache.clone()));
        let origin = Arc::new(HttpOriginClient::new(&settings.origin)?);
        let registry = DeploymentRegistry::from_policies(
            settings.deployments.clone(),
            cache,
            origin,
        )?;

        for deployment in &settings.deployments {
            info!(
                deployment = %deployment.name,
                site_domain = %deployment.site_domain,
                "Deployment configured"
            );
        }

        Ok(Self {
            settings,
            registry: Arc::new(registry),
        })
    }

    /// The complete HTTP surface
    pub fn router(&self) -> Router {
        EdgeService::new(Arc::clone(&self.registry)).into_router(EdgeMiddlewareStack::new())
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let address = self.settings.bind_address();
        let listener = TcpListener::bind(&address).await?;
        info!(
            address = %address,
            environment = %self.settings.application.environment,
            deployments = self.registry.len(),
            "Starting Edge Warden server"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
