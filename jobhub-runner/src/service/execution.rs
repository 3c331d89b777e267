//! Execution service
//!
//! Runs a job's command inside its snapshot:
//! - Linking the external data directory into the snapshot
//! - Exposing the job's GPUs through the environment
//! - Launching the command through the shell
//! - Streaming combined stdout/stderr to the console and `output.txt`
//!
//! The service never touches the job's status; the scheduler records the
//! returned outcome.

use async_trait::async_trait;
use jobhub_core::domain::job::Job;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::execution::{ExecutionError, RunOutcome};

/// Lines buffered between the pipe readers and the output writer
const LINE_BUFFER: usize = 256;

/// Service trait for executing jobs
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Runs `job` to completion
    ///
    /// Failures are reported through the outcome, never as a panic or an
    /// early return; the caller decides which status to record.
    async fn execute(&self, job: &Job) -> RunOutcome;
}

/// Runs jobs as local shell processes
#[derive(Debug, Clone)]
pub struct ProcessExecutionService {
    gpu_env_var: String,
    echo_output: bool,
}

impl ProcessExecutionService {
    pub fn new(config: &Config) -> Self {
        Self {
            gpu_env_var: config.gpu_env_var.clone(),
            echo_output: config.echo_output,
        }
    }

    /// Environment override restricting the job to its GPUs
    ///
    /// Jobs without a GPU list inherit the runner's visibility unchanged.
    pub fn gpu_override(&self, job: &Job) -> Option<(String, String)> {
        job.gpus.as_ref().map(|gpus| {
            let ids = gpus
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            (self.gpu_env_var.clone(), ids)
        })
    }

    async fn run(&self, job: &Job) -> Result<Option<i32>, ExecutionError> {
        let link = ensure_data_binding(job).await?;
        debug!(job = %job.name, link = %link.display(), "data directory bound");

        let output_path = job.output_file();
        let mut output = File::create(&output_path)
            .await
            .map_err(|source| ExecutionError::OutputFile {
                path: output_path.clone(),
                source,
            })?;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&job.cmd)
            .current_dir(job.snapshot_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some((key, value)) = self.gpu_override(job) {
            debug!(job = %job.name, "{}={}", key, value);
            command.env(key, value);
        }

        info!(job = %job.name, cmd = %job.cmd, "Launching job process");
        let mut child = command.spawn().map_err(ExecutionError::Launch)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::Launch(io::Error::other("stdout was not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::Launch(io::Error::other("stderr was not captured")))?;

        let (tx, mut rx) = mpsc::channel(LINE_BUFFER);
        let stdout_task = tokio::spawn(forward_lines(stdout, tx.clone()));
        let stderr_task = tokio::spawn(forward_lines(stderr, tx));

        let mut console = self.echo_output.then(tokio::io::stdout);
        let mut streamed = Ok(());

        while let Some(line) = rx.recv().await {
            if let Err(e) = write_line(&mut output, console.as_mut(), &line).await {
                streamed = Err(e);
                break;
            }
        }

        if let Err(e) = streamed {
            warn!(job = %job.name, error = %e, "Output stream failed, killing job process");
            drop(rx);
            let _ = child.kill().await;
            return Err(ExecutionError::Output(e));
        }

        for task in [stdout_task, stderr_task] {
            task.await
                .map_err(|e| ExecutionError::Output(io::Error::other(e)))?
                .map_err(ExecutionError::Output)?;
        }

        output.flush().await.map_err(ExecutionError::Output)?;
        if let Some(console) = console.as_mut() {
            console.flush().await.map_err(ExecutionError::Output)?;
        }

        let status = child.wait().await.map_err(ExecutionError::Output)?;
        Ok(status.code())
    }
}

#[async_trait]
impl ExecutionService for ProcessExecutionService {
    async fn execute(&self, job: &Job) -> RunOutcome {
        match self.run(job).await {
            Ok(exit_code) => RunOutcome::from_exit(exit_code),
            Err(e) => RunOutcome::Failed(e),
        }
    }
}

/// Links the job's data directory into its snapshot
///
/// An existing entry at the link path is left as it is, so re-running a job
/// reuses the link created by its first run.
pub async fn ensure_data_binding(job: &Job) -> Result<PathBuf, ExecutionError> {
    let link = job
        .data_link()
        .ok_or_else(|| ExecutionError::UnnamedDataDir(job.data_dir.clone()))?;

    match fs::symlink_metadata(&link).await {
        Ok(_) => return Ok(link),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(ExecutionError::DataBinding { link, source }),
    }

    match fs::symlink(&job.data_dir, &link).await {
        Ok(()) => Ok(link),
        Err(source) => Err(ExecutionError::DataBinding { link, source }),
    }
}

/// Sends every line read from `reader` to `tx`, terminators included
async fn forward_lines<R>(reader: R, tx: mpsc::Sender<Vec<u8>>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        if tx.send(line).await.is_err() {
            // Receiver gone: the writer already failed.
            return Ok(());
        }
    }
}

async fn write_line(
    output: &mut File,
    console: Option<&mut tokio::io::Stdout>,
    line: &[u8],
) -> io::Result<()> {
    output.write_all(line).await?;
    if let Some(console) = console {
        console.write_all(line).await?;
    }
    Ok(())
}
