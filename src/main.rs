use anyhow::{Context, Result};
use clap::CommandFactory;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use jsonflood::config::{CliArgs, Config};
use jsonflood::engine::{DeliveryEngine, ShutdownCoordinator};
use jsonflood::schema::{load_schema, InstanceGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}\n", e);
            CliArgs::command().print_help().ok();
            std::process::exit(2);
        }
    };

    init_logging(&config)?;

    tracing::info!("jsonflood starting...");
    tracing::info!(
        "Template: {}, endpoint: {}, clients: {}",
        config.template.display(),
        config.endpoint,
        config.clients
    );
    for option in config.unimplemented_options() {
        tracing::warn!("{} is accepted but not implemented, ignoring it", option);
    }

    let schema = load_schema(&config.template)?;
    let generator = InstanceGenerator::from_schema(&schema)
        .with_context(|| format!("Failed to compile schema {}", config.template.display()))?;

    let engine = DeliveryEngine::new(generator, config.engine_config());
    let coordinator = Arc::new(ShutdownCoordinator::new());

    let listener = {
        let coordinator = coordinator.clone();
        let run_timeout = config.run_timeout;
        tokio::spawn(async move { coordinator.listen(run_timeout).await })
    };

    let outcome = engine.run_until_shutdown(&coordinator).await;
    listener.abort();

    match outcome {
        Ok(report) => {
            if config.json_report {
                let json = report
                    .to_json()
                    .context("Failed to serialize performance report")?;
                println!("{}", json);
            } else {
                println!("{}", report);
            }
        }
        Err(e) => tracing::warn!("No performance statistics: {}", e),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Stderr by default, or append to `--log-file` without ANSI colors
fn init_logging(config: &Config) -> Result<()> {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}
