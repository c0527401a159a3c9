//! Standalone mock ingestion endpoint.
//!
//! Listens on `127.0.0.1:<port>` and answers `POST /events/` with a fixed or
//! random status code until interrupted.

use anyhow::Result;
use clap::Parser;

use jsonflood::mock_server::{MockEndpoint, MockEndpointConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mock endpoint answering POST /events/ requests")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "9999")]
    port: u16,

    /// Always answer with this status code instead of a random one
    #[arg(long, value_name = "CODE")]
    status: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let mut endpoint = MockEndpoint::new(MockEndpointConfig {
        port: args.port,
        status: args.status,
    })?;
    endpoint.start().await?;

    match args.status {
        Some(code) => tracing::info!("Mock endpoint listening on {} (status {})", endpoint.url(), code),
        None => tracing::info!("Mock endpoint listening on {} (random status)", endpoint.url()),
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received {} requests, shutting down", endpoint.received());
    endpoint.stop();

    Ok(())
}
