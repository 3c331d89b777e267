//! Configuration module
//!
//! Settings shared by every command.

use jobhub_store::JobQueue;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Queue root directory
    pub queue_dir: PathBuf,
}

impl Config {
    /// Opens the queue, creating its root directory if needed
    pub async fn open_queue(&self) -> anyhow::Result<JobQueue> {
        use anyhow::Context;

        JobQueue::open(&self.queue_dir)
            .await
            .with_context(|| format!("Failed to open queue at {}", self.queue_dir.display()))
    }
}
