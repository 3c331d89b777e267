//! Job runner loop
//!
//! Scans the queue for the oldest ready job and executes it, one job at a
//! time. Execution failures end up in the job's status; they never stop the
//! loop.

use anyhow::Result;
use jobhub_core::domain::job::Job;
use jobhub_store::JobQueue;
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::execution::{RunOutcome, RunReport};
use crate::service::{ExecutionService, ProcessExecutionService};

/// Single-slot runner over a [`JobQueue`]
pub struct JobRunner {
    config: Config,
    queue: Arc<JobQueue>,
    executor: Arc<dyn ExecutionService>,
}

impl JobRunner {
    /// Creates a runner with a custom execution service
    pub fn new(config: Config, queue: Arc<JobQueue>, executor: Arc<dyn ExecutionService>) -> Self {
        Self {
            config,
            queue,
            executor,
        }
    }

    /// Creates a runner that executes jobs as shell processes
    pub fn with_processes(config: Config, queue: Arc<JobQueue>) -> Self {
        let executor = Arc::new(ProcessExecutionService::new(&config));
        Self::new(config, queue, executor)
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Runs the loop until the process exits
    pub async fn start(&self) -> Result<()> {
        info!(
            queue_dir = %self.queue.queue_dir().display(),
            "Starting job runner (interval: {:?})",
            self.config.poll_interval
        );

        loop {
            if let Some(report) = self.poll_once().await {
                debug!(
                    job = %report.job.name,
                    status = %report.job.status,
                    "runner cycle complete"
                );
            }
        }
    }

    /// Performs a single cycle: scan, pick the oldest ready job, wait the
    /// poll interval, then run the job if there was one
    pub async fn poll_once(&self) -> Option<RunReport> {
        let next = match self.queue.update().await {
            Ok(report) => {
                if !report.skipped.is_empty() {
                    warn!(skipped = report.skipped.len(), "Some jobs could not be loaded");
                }
                self.queue.oldest().await
            }
            Err(e) => {
                error!("Failed to scan job queue: {:#}", e);
                None
            }
        };

        time::sleep(self.config.poll_interval).await;

        match next {
            Some(job) => Some(self.run_job(job).await),
            None => {
                debug!("No ready jobs");
                None
            }
        }
    }

    /// Loads `name` from the queue and runs it once, whatever its status
    pub async fn run_named(&self, name: &str) -> jobhub_store::Result<RunReport> {
        let job = self.queue.load(name).await?;
        Ok(self.run_job(job).await)
    }

    /// Executes `job` and records the resulting status
    ///
    /// A failure to record the status is logged; the job then stays as it
    /// was on disk and is picked up again by the next scan.
    pub async fn run_job(&self, mut job: Job) -> RunReport {
        info!(job = %job.name, cmd = %job.cmd, "Running job");

        let outcome = self.executor.execute(&job).await;
        let status = outcome.status(self.config.nonzero_exit_is_crash);

        match &outcome {
            RunOutcome::Completed { exit_code } => {
                info!(job = %job.name, exit_code = ?exit_code, status = %status, "Job completed");
            }
            RunOutcome::Failed(e) => {
                error!(job = %job.name, status = %status, "Job failed: {}", e);
            }
        }

        if let Err(e) = self.queue.write_status(&mut job, status).await {
            error!(job = %job.name, "Failed to record job status: {}", e);
        }

        RunReport { job, outcome }
    }
}
