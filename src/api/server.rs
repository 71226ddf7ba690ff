use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::signal;
use tracing::{debug, error, info};

use crate::api::routes;
use crate::api::types::ApiState;
use crate::config::Settings;
use crate::error::Error;
use crate::types::Result;

/// Mock CA HTTP server
///
/// Binds the router built from an [`ApiState`] and serves it until a
/// shutdown signal arrives.
pub struct ApiServer {
    /// Listening address
    address: SocketAddr,
    /// Router
    router: Router,
}

impl ApiServer {
    /// Create a new API server from settings
    pub fn new(settings: &Settings, state: ApiState) -> Result<Self> {
        let address = settings.listen_addr()?;
        let timeout = std::time::Duration::from_secs(settings.server.request_timeout_secs);
        let router = routes::create_router(state, timeout);

        Ok(Self { address, router })
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn start_with_shutdown(&self) -> Result<()> {
        self.serve_until(Self::shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn serve_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Starting mock CA server on {}", self.address);

        let server = axum::Server::try_bind(&self.address)
            .map_err(|e| Error::Config(format!("Failed to bind {}: {}", self.address, e)))?
            .serve(self.router.clone().into_make_service());

        if let Err(e) = server.with_graceful_shutdown(shutdown).await {
            error!("API server error: {}", e);
            return Err(Error::Internal(format!("API server error: {}", e)));
        }

        info!("Mock CA server shut down gracefully");
        Ok(())
    }

    /// Wait for CTRL+C or SIGTERM
    async fn shutdown_signal() {
        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => debug!("Received Ctrl+C signal"),
                Err(e) => {
                    error!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    debug!("Received SIGTERM signal");
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("Shutdown signal received, starting graceful shutdown");
    }

    pub fn address(&self) -> &SocketAddr {
        &self.address
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::mock::tests::TEST_CA;
    use crate::telemetry::MetricsCollector;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let mut settings = Settings::default();
        settings.server.listen_addr = "127.0.0.1:0".into();

        let state = ApiState::new(TEST_CA.clone(), Arc::new(MetricsCollector::new().unwrap()));
        let server = ApiServer::new(&settings, state).unwrap();

        // Resolves immediately, so the server stops right after binding
        assert!(server.serve_until(async {}).await.is_ok());
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let mut settings = Settings::default();
        settings.server.listen_addr = "nowhere".into();

        let state = ApiState::new(TEST_CA.clone(), Arc::new(MetricsCollector::new().unwrap()));
        assert!(matches!(ApiServer::new(&settings, state), Err(Error::Config(_))));
    }
}
