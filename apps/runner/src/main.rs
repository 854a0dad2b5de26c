#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scout::{Outcome, Registry};
use tracing::{info, warn};

mod config;

use config::RunnerConfig;

/// Monitor the endpoints of a config file and log every check outcome
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Endpoint list (toml or json); defaults to $XDG_CONFIG_HOME/scout/endpoints.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Outcomes buffered before endpoint loops wait, overrides the config file
    #[arg(short, long)]
    buffer: Option<usize>,

    /// Print the loaded configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logger = logger::init();

    let config = RunnerConfig::from_config(cli.config.as_deref())
        .context("Failed to load endpoint configuration")?;
    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    let buffer = cli.buffer.unwrap_or(config.outcome_buffer);
    let registry = Registry::with_buffer(config.endpoints, logger, buffer)
        .context("Invalid endpoint configuration")?;
    registry.start_all().await;
    info!(endpoints = registry.len().await, buffer, "Scout runner started");

    let outcomes = registry.outcome_stream();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for shutdown signal")?;
                info!("Shutdown requested");
                break;
            }
            outcome = outcomes.recv() => match outcome {
                Some(outcome) => report(&registry, &outcome).await,
                None => break,
            },
        }
    }

    registry.stop_all().await;
    Ok(())
}

async fn report(registry: &Registry, outcome: &Outcome) {
    let name = registry
        .get_endpoint(outcome.endpoint())
        .await
        .map(|snapshot| snapshot.config.display_name().to_string())
        .unwrap_or_default();

    match outcome {
        Outcome::Success(success) => info!(
            endpoint = %success.endpoint,
            name = %name,
            network = %success.network_latency,
            request = %success.request_latency,
            "Endpoint up"
        ),
        Outcome::Failure(failure) => warn!(
            endpoint = %failure.endpoint,
            name = %name,
            network = %failure.network_latency,
            exhausted = failure.retries_exhausted,
            traces = failure.trace_data.len(),
            "Endpoint down: {}",
            failure.issue
        ),
    }
}
