//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod runner;

use anyhow::Result;
use clap::Subcommand;
use jobhub_core::domain::job::StatusFilter;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Snapshot a code directory and queue a command to run in it
    Add {
        /// Job name; generated when omitted
        #[arg(long)]
        name: Option<String>,

        /// Code directory to snapshot
        #[arg(long)]
        code: PathBuf,

        /// Data directory to link into the snapshot
        #[arg(long)]
        data: PathBuf,

        /// Command line after `--`, run through `sh -c` inside the snapshot
        #[arg(last = true, required = true, value_name = "CMD")]
        cmd: Vec<String>,

        /// GPU ids, comma separated, or "none"
        #[arg(long)]
        gpus: Option<String>,

        /// Start the runner once the job is queued
        #[arg(long)]
        start: bool,
    },
    /// Remove a job by name, or every job with a status
    #[command(visible_alias = "remove")]
    Rm {
        #[arg(long, conflicts_with = "status", required_unless_present = "status")]
        name: Option<String>,

        /// ready, finished, crashed or all
        #[arg(long)]
        status: Option<StatusFilter>,
    },
    /// List jobs in submission order
    #[command(visible_alias = "list")]
    Ls {
        /// ready, finished, crashed or all
        #[arg(long, default_value = "ready")]
        status: StatusFilter,

        /// Print jobs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one job now, whatever its status
    Run {
        name: String,
    },
    /// Run queued jobs until interrupted
    #[command(visible_alias = "s")]
    Start,
    /// Print the captured output of a job's last run
    #[command(visible_alias = "p")]
    Print {
        name: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Add {
            name,
            code,
            data,
            cmd,
            gpus,
            start,
        } => {
            let request = job::build_request(name, code, data, &cmd, gpus.as_deref())?;
            job::add_job(config, request).await?;
            if start {
                runner::start_runner(config).await?;
            }
            Ok(())
        }
        Commands::Rm { name, status } => job::remove_jobs(config, name, status).await,
        Commands::Ls { status, json } => job::list_jobs(config, status, json).await,
        Commands::Run { name } => runner::run_job(config, &name).await,
        Commands::Start => runner::start_runner(config).await,
        Commands::Print { name } => job::print_output(config, &name).await,
    }
}
