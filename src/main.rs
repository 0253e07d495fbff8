//! imgedit-rs gateway binary
//!
//! HTTP service for AI-assisted image editing sessions and batch
//! transformation processing.

use imgedit_rs::config::GatewayConfig;
use imgedit_rs::server;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; real deployments set variables directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> imgedit_rs::Result<()> {
    // GATEWAY_CONFIG points at a YAML file; otherwise configure from env
    let config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) => GatewayConfig::from_file(&path).await?,
        Err(_) => GatewayConfig::from_env()?,
    };

    server::run_server(config).await
}
