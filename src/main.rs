//! # Omsim Social
//!
//! Application entry point. Initializes logging, loads configuration and
//! serves the HTTP API until a shutdown signal arrives.

use anyhow::Result;
use tracing::info;

use omsim_social::config::Settings;
use omsim_social::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    omsim_social::telemetry::init_tracing();

    info!("Starting Omsim Social...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        redis = settings.redis.enabled,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
