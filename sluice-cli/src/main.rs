//! Sluice CLI
//!
//! Command-line interface for draining queues and reading streams through
//! the cursor poller.

mod commands;
mod config;
mod resolver;
mod resume;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Queue and stream polling CLI", long_about = None)]
struct Cli {
    /// Queue and stream service endpoint
    #[arg(
        long,
        global = true,
        env = "SLUICE_ENDPOINT_URL",
        default_value = "http://localhost:4566"
    )]
    endpoint_url: String,

    /// Timeout for each request, in seconds
    #[arg(long, global = true, env = "SLUICE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Resumptions allowed after a transient fetch error
    #[arg(long, global = true, env = "SLUICE_RETRIES", default_value_t = 3)]
    retries: u32,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice_cli=info,sluice_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::new(cli.endpoint_url);
    config.request_timeout = Duration::from_secs(cli.timeout_secs);
    config.retry.max_retries = cli.retries;
    config.validate()?;

    handle_command(cli.command, &config)
}
