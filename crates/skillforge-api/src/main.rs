//! SkillForge API server entry point.

use std::error::Error;

use skillforge_api::config::ApiConfig;
use skillforge_api::{app, build_state, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ApiConfig::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting SkillForge API server");

    let state = build_state(&config).await?;
    let addr = config.bind_address()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
