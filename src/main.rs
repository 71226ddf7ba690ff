use anyhow::{Context, Result};
use external_issuer::{
    api::{ApiServer, ApiState},
    ca::MockCa,
    config::Settings,
    telemetry::{self, MetricsCollector},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env and configuration
    dotenvy::dotenv().ok();
    let settings = Settings::load().context("Failed to load configuration")?;

    // 2. Initialize logging
    telemetry::init_logging(&settings.logging)?;
    info!("Starting mock CA server v{}", env!("CARGO_PKG_VERSION"));

    // 3. Generate the CA before accepting requests
    let ca = Arc::new(MockCa::new(settings.ca.clone()));
    let authority = ca.authority().await.context("Failed to initialize CA")?;
    info!("CA initialized: {}", authority.subject());

    // 4. Serve until shutdown
    let metrics = Arc::new(MetricsCollector::new()?);
    metrics.set_ca_initialized(true);
    let server = ApiServer::new(&settings, ApiState::new(ca, metrics))?;
    server.start_with_shutdown().await?;

    info!("Mock CA server stopped");
    Ok(())
}
