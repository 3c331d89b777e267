//! Job queue
//!
//! The queue is the single shared context for everything that touches the
//! queue root: the in-memory index of jobs, status reads and writes, and the
//! add/remove/list operations used by the CLI and the runner.
//!
//! Every operation holds one lock for its whole duration, file I/O
//! included, so two operations in the same process never interleave. Nothing
//! protects the directory against a second process.

use chrono::Utc;
use jobhub_core::domain::job::{Job, JobStatus, StatusFilter};
use jobhub_core::dto::job::CreateJob;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::store::JobStore;

/// A job directory that could not be loaded during a scan
#[derive(Debug)]
pub struct SkippedJob {
    pub name: String,
    pub error: QueueError,
}

/// Outcome of rescanning the queue root
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Number of jobs now in the index
    pub loaded: usize,
    /// Directories left out of the index
    pub skipped: Vec<SkippedJob>,
}

/// What to delete in [`JobQueue::remove`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveTarget {
    Name(String),
    Status(StatusFilter),
}

impl From<StatusFilter> for RemoveTarget {
    fn from(filter: StatusFilter) -> Self {
        RemoveTarget::Status(filter)
    }
}

impl From<JobStatus> for RemoveTarget {
    fn from(status: JobStatus) -> Self {
        RemoveTarget::Status(StatusFilter::Only(status))
    }
}

/// Directory-backed job queue
#[derive(Debug)]
pub struct JobQueue {
    queue_dir: PathBuf,
    store: JobStore,
    /// Index of the last scan keyed by job name; the lock also guards all
    /// file access made through the queue
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobQueue {
    /// Creates a queue rooted at `queue_dir` without touching the filesystem
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
            store: JobStore::new(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Opens the queue at `queue_dir`, creating the directory if needed
    pub async fn open(queue_dir: impl AsRef<Path>) -> Result<Self> {
        let queue_dir = resolve_path(queue_dir.as_ref())?;
        fs::create_dir_all(&queue_dir)
            .await
            .map_err(|e| QueueError::io(&queue_dir, e))?;
        debug!(queue_dir = %queue_dir.display(), "opened job queue");
        Ok(Self::new(queue_dir))
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    pub fn job_dir(&self, name: &str) -> PathBuf {
        self.queue_dir.join(name)
    }

    /// Rebuilds the index from the queue root
    ///
    /// Directories that fail to load are logged and skipped; the scan only
    /// fails if the queue root itself cannot be read.
    pub async fn update(&self) -> Result<ScanReport> {
        let mut jobs = self.jobs.lock().await;
        self.rescan(&mut jobs).await
    }

    async fn rescan(&self, jobs: &mut HashMap<String, Job>) -> Result<ScanReport> {
        let mut entries = fs::read_dir(&self.queue_dir)
            .await
            .map_err(|e| QueueError::io(&self.queue_dir, e))?;

        let mut fresh = HashMap::new();
        let mut report = ScanReport::default();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| QueueError::io(&self.queue_dir, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            match self.store.read(&entry.path()).await {
                Ok(job) => {
                    fresh.insert(name, job);
                }
                Err(error) => {
                    warn!(job = %name, error = %error, "Failed to read job, skipping");
                    report.skipped.push(SkippedJob { name, error });
                }
            }
        }

        report.loaded = fresh.len();
        *jobs = fresh;

        debug!(
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "rescanned job queue"
        );
        Ok(report)
    }

    /// Oldest ready job in the index, if any
    ///
    /// Reads the index as of the last [`update`](Self::update).
    pub async fn oldest(&self) -> Option<Job> {
        let jobs = self.jobs.lock().await;
        jobs.values()
            .filter(|job| job.status == JobStatus::Ready)
            .min_by(|a, b| submission_order(a, b))
            .cloned()
    }

    /// Rescans and returns the matching jobs in submission order
    pub async fn list(&self, filter: StatusFilter) -> Result<Vec<Job>> {
        let mut jobs = self.jobs.lock().await;
        self.rescan(&mut jobs).await?;

        let mut selected: Vec<Job> = jobs
            .values()
            .filter(|job| filter.matches(job.status))
            .cloned()
            .collect();
        selected.sort_by(submission_order);
        Ok(selected)
    }

    /// Adds a job: snapshots the code tree and records it as `ready`
    ///
    /// A job with the same name is replaced.
    pub async fn add(&self, request: CreateJob) -> Result<Job> {
        let name = match request.name {
            Some(name) => name,
            None => format!("job-{}", Uuid::new_v4().simple()),
        };
        validate_name(&name)?;
        validate_command(&request.cmd)?;
        validate_path(&request.code_dir)?;
        validate_path(&request.data_dir)?;

        let job = Job {
            job_dir: self.job_dir(&name),
            name,
            code_dir: resolve_path(&request.code_dir)?,
            data_dir: resolve_path(&request.data_dir)?,
            cmd: request.cmd,
            gpus: request.gpus,
            submitted_at: request.submitted_at.unwrap_or_else(Utc::now),
            status: JobStatus::Ready,
        };

        let mut jobs = self.jobs.lock().await;
        self.store.write(&job).await?;
        jobs.insert(job.name.clone(), job.clone());

        info!(
            job = %job.name,
            code_dir = %job.code_dir.display(),
            data_dir = %job.data_dir.display(),
            "Added job to queue"
        );
        Ok(job)
    }

    /// Loads a single job by name straight from disk
    pub async fn load(&self, name: &str) -> Result<Job> {
        validate_name(name)?;
        let _jobs = self.jobs.lock().await;
        self.store.read(&self.job_dir(name)).await
    }

    /// Deletes job directories, returning the names removed
    pub async fn remove(&self, target: impl Into<RemoveTarget>) -> Result<Vec<String>> {
        let mut jobs = self.jobs.lock().await;

        let names = match target.into() {
            RemoveTarget::Name(name) => {
                validate_name(&name)?;
                vec![name]
            }
            RemoveTarget::Status(filter) => {
                self.rescan(&mut jobs).await?;
                let mut names: Vec<String> = jobs
                    .values()
                    .filter(|job| filter.matches(job.status))
                    .map(|job| job.name.clone())
                    .collect();
                names.sort();
                names
            }
        };

        for name in &names {
            let job_dir = self.job_dir(name);
            fs::remove_dir_all(&job_dir)
                .await
                .map_err(|e| QueueError::io(&job_dir, e))?;
            jobs.remove(name);
            info!(job = %name, "Removed job");
        }

        Ok(names)
    }

    /// Reads the persisted status of `job`
    pub async fn read_status(&self, job: &Job) -> Result<JobStatus> {
        let mut jobs = self.jobs.lock().await;
        let status = self.store.read_status(&job.job_dir).await?;
        if let Some(entry) = jobs.get_mut(&job.name) {
            entry.status = status;
        }
        Ok(status)
    }

    /// Persists `status` for `job`, replacing whatever was recorded
    pub async fn write_status(&self, job: &mut Job, status: JobStatus) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        self.store.write_status(&job.job_dir, status).await?;
        job.status = status;
        if let Some(entry) = jobs.get_mut(&job.name) {
            entry.status = status;
        }
        debug!(job = %job.name, status = %status, "wrote job status");
        Ok(())
    }

    /// Captured output of the last run of `name`
    pub async fn read_output(&self, name: &str) -> Result<String> {
        validate_name(name)?;
        let _jobs = self.jobs.lock().await;
        let job = self.store.read(&self.job_dir(name)).await?;
        let output_file = job.output_file();
        fs::read_to_string(&output_file)
            .await
            .map_err(|e| QueueError::io(&output_file, e))
    }
}

/// Oldest submission first; names break ties
fn submission_order(a: &Job, b: &Job) -> Ordering {
    a.submitted_at
        .cmp(&b.submitted_at)
        .then_with(|| a.name.cmp(&b.name))
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(QueueError::InvalidJob(format!("invalid job name '{name}'")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(QueueError::InvalidJob(format!(
            "job name '{name}' must not contain path separators"
        )));
    }
    Ok(())
}

fn validate_command(cmd: &str) -> Result<()> {
    if cmd.trim().is_empty() {
        return Err(QueueError::InvalidJob("command is empty".to_string()));
    }
    if cmd.contains(['\n', '\r']) {
        return Err(QueueError::InvalidJob(
            "command must be a single line".to_string(),
        ));
    }
    Ok(())
}

/// Paths are stored one per line, so they cannot contain line breaks
fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(QueueError::InvalidJob("path is empty".to_string()));
    }
    if path.to_string_lossy().contains(['\n', '\r']) {
        return Err(QueueError::InvalidJob(format!(
            "path {:?} must be a single line",
            path
        )));
    }
    Ok(())
}

/// Expands a leading `~` and makes `path` absolute
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| QueueError::InvalidJob("home directory not found".to_string()))?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };

    std::path::absolute(&expanded).map_err(|e| QueueError::io(&expanded, e))
}
