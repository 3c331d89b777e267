//! Jobhub Runner
//!
//! Long-running worker that consumes a job queue directory. Every poll
//! interval it rescans the queue, picks the oldest ready job and runs it to
//! completion before looking again.

use anyhow::{Context, Result};
use jobhub_runner::{Config, JobRunner};
use jobhub_store::JobQueue;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobhub_runner=info,jobhub_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Jobhub Runner");

    let config = load_config()?;
    info!(
        "Loaded configuration: queue_dir={}, gpu_env_var={}",
        config.queue_dir.display(),
        config.gpu_env_var
    );

    let queue = JobQueue::open(&config.queue_dir)
        .await
        .with_context(|| format!("Failed to open queue at {}", config.queue_dir.display()))?;
    let queue = Arc::new(queue);

    let runner = JobRunner::with_processes(config, queue);

    info!("Starting job runner loop");
    if let Err(e) = runner.start().await {
        error!("Runner error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Loads configuration from environment variables
///
/// Unlike a missing variable, a malformed one is an error rather than a
/// silent fallback to the default.
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Invalid runner configuration")?;
    config.validate()?;
    Ok(config)
}
