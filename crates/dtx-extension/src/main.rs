//! dtx-extension - Steadybit extension for Dynatrace
//!
//! Serves the lifecycle webhooks and the Dynatrace actions.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dtx_api::DynatraceClient;
use dtx_extension::{AppState, ExtensionConfig, ExtensionServer, LogFormat};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExtensionConfig::parse().validate()?;
    init_tracing(config.log_format);

    info!(
        api_base_url = %config.api_base_url,
        ui_base_url = %config.ui_base_url,
        insecure_skip_verify = config.insecure_skip_verify,
        "Starting Dynatrace extension"
    );

    let client = DynatraceClient::new(config.client_config())
        .context("failed to create Dynatrace client")?;
    let state = AppState::from_client(Arc::new(client), &config.ui_base_url);
    let server = ExtensionServer::new(state);

    server
        .serve_with_shutdown(config.bind_addr(), shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
