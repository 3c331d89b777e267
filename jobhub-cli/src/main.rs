//! Jobhub CLI
//!
//! Command-line interface for managing a job queue directory and running
//! its jobs.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jobhub")]
#[command(about = "Single-node job queue", long_about = None)]
struct Cli {
    /// Queue root directory
    #[arg(long, env = "JOBHUB_QUEUE_DIR", default_value = "jobs", global = true)]
    queue_dir: PathBuf,

    /// Log queue and runner activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "jobhub_runner=debug,jobhub_store=debug"
    } else {
        "jobhub_runner=info,jobhub_store=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config {
        queue_dir: cli.queue_dir,
    };

    handle_command(cli.command, &config).await
}
