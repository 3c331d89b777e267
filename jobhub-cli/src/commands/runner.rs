//! Runner command handlers
//!
//! Runs jobs in the foreground of the CLI process. Execution settings other
//! than the queue location come from the runner's environment variables.

use anyhow::{Context, Result};
use colored::*;
use jobhub_core::domain::job::JobStatus;
use jobhub_runner::{JobRunner, RunOutcome};
use std::sync::Arc;

use crate::config::Config;

fn runner_config(config: &Config) -> Result<jobhub_runner::Config> {
    let mut runner_config =
        jobhub_runner::Config::from_env().context("Invalid runner configuration")?;
    runner_config.queue_dir = config.queue_dir.clone();
    runner_config.validate()?;
    Ok(runner_config)
}

async fn build_runner(config: &Config) -> Result<JobRunner> {
    let runner_config = runner_config(config)?;
    let queue = Arc::new(config.open_queue().await?);
    Ok(JobRunner::with_processes(runner_config, queue))
}

/// Run a single job by name
pub async fn run_job(config: &Config, name: &str) -> Result<()> {
    let runner = build_runner(config).await?;

    println!("{}", format!("Running job {}", name).bold());
    let report = runner
        .run_named(name)
        .await
        .with_context(|| format!("Failed to load job '{}'", name))?;

    let status = match report.job.status {
        JobStatus::Finished => report.job.status.as_str().green(),
        JobStatus::Crashed => report.job.status.as_str().red(),
        JobStatus::Ready => report.job.status.as_str().yellow(),
    };
    println!("  Status:    {}", status);

    match &report.outcome {
        RunOutcome::Completed {
            exit_code: Some(code),
        } => println!("  Exit Code: {}", code),
        RunOutcome::Completed { exit_code: None } => {
            println!("  Exit Code: {}", "killed by signal".dimmed())
        }
        RunOutcome::Failed(e) => println!("  Error:     {}", e.to_string().red()),
    }

    Ok(())
}

/// Run queued jobs until interrupted
pub async fn start_runner(config: &Config) -> Result<()> {
    let runner = build_runner(config).await?;

    println!(
        "{}",
        format!(
            "Watching {} for ready jobs (Ctrl-C to stop)",
            runner.queue().queue_dir().display()
        )
        .bold()
    );

    tokio::select! {
        result = runner.start() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Runner stopped.".yellow());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobhub_core::dto::job::CreateJob;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_job_records_status() {
        let tmp = TempDir::new().unwrap();
        let code = tmp.path().join("code");
        let data = tmp.path().join("data");
        std::fs::create_dir_all(&code).unwrap();
        std::fs::create_dir_all(&data).unwrap();
        let config = Config {
            queue_dir: tmp.path().join("jobs"),
        };

        let queue = config.open_queue().await.unwrap();
        queue
            .add(CreateJob::new(&code, &data, "echo done").with_name("once"))
            .await
            .unwrap();

        run_job(&config, "once").await.unwrap();

        let job = queue.load("once").await.unwrap();
        assert_eq!(job.status, JobStatus::Finished);
        assert_eq!(queue.read_output("once").await.unwrap(), "done\n");
    }

    #[tokio::test]
    async fn test_run_unknown_job_fails() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            queue_dir: tmp.path().join("jobs"),
        };

        assert!(run_job(&config, "ghost").await.is_err());
    }
}
