//! Execution types for the jobhub runner
//!
//! These types only exist while a job runs. The queue only ever sees the
//! status derived from them.

use jobhub_core::domain::job::{Job, JobStatus};
use std::path::PathBuf;
use thiserror::Error;

/// Exit code `sh` uses when the command could not be found
pub const SHELL_COMMAND_NOT_FOUND: i32 = 127;

/// Exit code `sh` uses when the command exists but cannot be executed
pub const SHELL_NOT_EXECUTABLE: i32 = 126;

/// Failure while preparing, launching or supervising a job's process
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The data source path has no final component to name the link after
    #[error("Data directory {} has no name to link", .0.display())]
    UnnamedDataDir(PathBuf),

    #[error("Failed to link data directory at {}: {source}", .link.display())]
    DataBinding {
        link: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open output file {}: {source}", .path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch command: {0}")]
    Launch(#[source] std::io::Error),

    #[error("Failed to stream process output: {0}")]
    Output(#[source] std::io::Error),

    #[error("Command not found (shell exit code 127)")]
    CommandNotFound,

    #[error("Command is not executable (shell exit code 126)")]
    NotExecutable,
}

/// Result of one run attempt
#[derive(Debug)]
pub enum RunOutcome {
    /// The process ran to completion; `None` means it was killed by a signal
    Completed { exit_code: Option<i32> },

    /// The process could not be set up, launched or supervised
    Failed(ExecutionError),
}

impl RunOutcome {
    /// Classifies the exit code reported by the shell
    ///
    /// The shell reports launch failures of the command itself through
    /// reserved exit codes; those count as failures, not completed runs.
    pub fn from_exit(exit_code: Option<i32>) -> Self {
        match exit_code {
            Some(SHELL_COMMAND_NOT_FOUND) => RunOutcome::Failed(ExecutionError::CommandNotFound),
            Some(SHELL_NOT_EXECUTABLE) => RunOutcome::Failed(ExecutionError::NotExecutable),
            exit_code => RunOutcome::Completed { exit_code },
        }
    }

    /// Status to persist for this outcome
    ///
    /// A completed run is `finished` whatever its exit code unless
    /// `nonzero_exit_is_crash` is set.
    pub fn status(&self, nonzero_exit_is_crash: bool) -> JobStatus {
        match self {
            RunOutcome::Completed { exit_code: Some(0) } => JobStatus::Finished,
            RunOutcome::Completed { .. } if nonzero_exit_is_crash => JobStatus::Crashed,
            RunOutcome::Completed { .. } => JobStatus::Finished,
            RunOutcome::Failed(_) => JobStatus::Crashed,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::Completed { exit_code } => *exit_code,
            RunOutcome::Failed(_) => None,
        }
    }
}

/// A job after a run attempt, with its recorded status
#[derive(Debug)]
pub struct RunReport {
    pub job: Job,
    pub outcome: RunOutcome,
}
