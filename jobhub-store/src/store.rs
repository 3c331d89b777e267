//! Job store
//!
//! Reads and writes the full on-disk record of a single job: the code
//! snapshot, `config.txt` and `status.txt`. The store holds no state and
//! takes no locks; `JobQueue` serializes access to it.

use jobhub_core::domain::job::{Job, JobStatus};
use jobhub_core::layout::{CONFIG_FILE, STATUS_FILE};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{QueueError, Result};
use crate::record::{self, ConfigRecord};

/// Filesystem access for one job directory at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct JobStore;

impl JobStore {
    pub fn new() -> Self {
        Self
    }

    /// Persists the full record of `job`, replacing whatever is at its path
    ///
    /// The old directory is deleted before the new one is written, so a
    /// failure part way through leaves no loadable job behind.
    pub async fn write(&self, job: &Job) -> Result<()> {
        match fs::remove_dir_all(&job.job_dir).await {
            Ok(()) => debug!(job = %job.name, "replaced existing job directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(QueueError::io(&job.job_dir, e)),
        }

        fs::create_dir_all(&job.job_dir)
            .await
            .map_err(|e| QueueError::io(&job.job_dir, e))?;

        let copied = copy_snapshot(&job.code_dir, &job.snapshot_dir(), job.data_dir_name()).await?;
        debug!(job = %job.name, files = copied, "copied code snapshot");

        let config_file = job.config_file();
        fs::write(&config_file, ConfigRecord::from_job(job).render())
            .await
            .map_err(|e| QueueError::io(&config_file, e))?;

        self.write_status(&job.job_dir, job.status).await
    }

    /// Loads the job stored in `job_dir`
    ///
    /// The job name is the directory name.
    pub async fn read(&self, job_dir: &Path) -> Result<Job> {
        let metadata = fs::metadata(job_dir)
            .await
            .map_err(|e| QueueError::io(job_dir, e))?;
        if !metadata.is_dir() {
            return Err(QueueError::NotFound(job_dir.to_path_buf()));
        }

        let name = job_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| QueueError::NotFound(job_dir.to_path_buf()))?;

        let config_file = job_dir.join(CONFIG_FILE);
        let text = fs::read_to_string(&config_file)
            .await
            .map_err(|e| QueueError::io(&config_file, e))?;
        let config = ConfigRecord::parse(&config_file, &text)?;

        let status = self.read_status(job_dir).await?;

        Ok(Job {
            name,
            job_dir: job_dir.to_path_buf(),
            code_dir: config.code_dir,
            data_dir: config.data_dir,
            cmd: config.cmd,
            gpus: config.gpus,
            submitted_at: config.submitted_at,
            status,
        })
    }

    pub async fn read_status(&self, job_dir: &Path) -> Result<JobStatus> {
        let status_file = job_dir.join(STATUS_FILE);
        let text = fs::read_to_string(&status_file)
            .await
            .map_err(|e| QueueError::io(&status_file, e))?;
        record::parse_status(&status_file, &text)
    }

    pub async fn write_status(&self, job_dir: &Path, status: JobStatus) -> Result<()> {
        let status_file = job_dir.join(STATUS_FILE);
        fs::write(&status_file, record::render_status(status))
            .await
            .map_err(|e| QueueError::io(&status_file, e))
    }
}

/// Recursively copies `src` into `dst`, returning the number of files copied
///
/// Entries named `exclude` are skipped at every depth. Symbolic links are
/// followed, so the snapshot holds the content they pointed at when it was
/// taken; a directory reached twice through links is copied once. A plain
/// file source is copied into `dst`.
async fn copy_snapshot(src: &Path, dst: &Path, exclude: Option<&OsStr>) -> Result<u64> {
    let metadata = fs::metadata(src).await.map_err(|e| QueueError::io(src, e))?;

    if !metadata.is_dir() {
        let name = src
            .file_name()
            .ok_or_else(|| QueueError::InvalidJob(format!("{} has no file name", src.display())))?;
        fs::create_dir_all(dst)
            .await
            .map_err(|e| QueueError::io(dst, e))?;
        fs::copy(src, dst.join(name))
            .await
            .map_err(|e| QueueError::io(src, e))?;
        return Ok(1);
    }

    let mut copied = 0;
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        let real = fs::canonicalize(&from)
            .await
            .map_err(|e| QueueError::io(&from, e))?;
        if !visited.insert(real) {
            warn!(path = %from.display(), "directory already copied through a link, skipping");
            continue;
        }

        fs::create_dir_all(&to)
            .await
            .map_err(|e| QueueError::io(&to, e))?;

        let mut entries = fs::read_dir(&from)
            .await
            .map_err(|e| QueueError::io(&from, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| QueueError::io(&from, e))?
        {
            let name = entry.file_name();
            if exclude == Some(name.as_os_str()) {
                debug!(path = %entry.path().display(), "skipping data directory in snapshot");
                continue;
            }

            let source = entry.path();
            let target = to.join(&name);
            let metadata = fs::metadata(&source)
                .await
                .map_err(|e| QueueError::io(&source, e))?;

            if metadata.is_dir() {
                pending.push((source, target));
            } else {
                fs::copy(&source, &target)
                    .await
                    .map_err(|e| QueueError::io(&source, e))?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        code: PathBuf,
        data: PathBuf,
        queue: PathBuf,
    }

    /// Code tree with a nested module and a copy of the data dir inside it
    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let code = tmp.path().join("project");
        let data = tmp.path().join("datasets").join("data");
        let queue = tmp.path().join("jobs");

        std::fs::create_dir_all(code.join("models")).unwrap();
        std::fs::create_dir_all(code.join("data")).unwrap();
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(code.join("train.py"), "print('train')\n").unwrap();
        std::fs::write(code.join("models").join("net.py"), "NET = 1\n").unwrap();
        std::fs::write(code.join("data").join("big.bin"), vec![0u8; 64]).unwrap();

        Fixture {
            tmp,
            code,
            data,
            queue,
        }
    }

    fn job_for(fx: &Fixture, name: &str) -> Job {
        Job {
            name: name.to_string(),
            job_dir: fx.queue.join(name),
            code_dir: fx.code.clone(),
            data_dir: fx.data.clone(),
            cmd: "python train.py".to_string(),
            gpus: Some(vec![1, 0]),
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            status: JobStatus::Ready,
        }
    }

    #[tokio::test]
    async fn test_write_then_read_preserves_job() {
        let fx = fixture();
        let store = JobStore::new();
        let job = job_for(&fx, "resnet");

        store.write(&job).await.unwrap();
        let loaded = store.read(&job.job_dir).await.unwrap();

        assert_eq!(loaded, job);
    }

    #[tokio::test]
    async fn test_command_whitespace_survives_round_trip() {
        let fx = fixture();
        let store = JobStore::new();
        let mut job = job_for(&fx, "escaped");
        job.cmd = "echo a\\ ".to_string();

        store.write(&job).await.unwrap();
        let loaded = store.read(&job.job_dir).await.unwrap();

        assert_eq!(loaded.cmd, "echo a\\ ");
        assert_eq!(loaded, job);
    }

    #[tokio::test]
    async fn test_write_lays_out_job_directory() {
        let fx = fixture();
        let store = JobStore::new();
        let job = job_for(&fx, "resnet");

        store.write(&job).await.unwrap();

        let snapshot = job.snapshot_dir();
        assert!(snapshot.join("train.py").is_file());
        assert!(snapshot.join("models").join("net.py").is_file());
        assert!(!snapshot.join("data").exists());

        let config = std::fs::read_to_string(job.config_file()).unwrap();
        let lines: Vec<&str> = config.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("code_dir: "));
        assert!(lines[1].starts_with("data_dir: "));
        assert_eq!(lines[2], "cmd: python train.py");
        assert!(lines[3].starts_with("time: "));
        assert_eq!(lines[4], "gpus: 1,0");

        let status = std::fs::read_to_string(job.status_file()).unwrap();
        assert_eq!(status, "status: ready\n");
    }

    #[tokio::test]
    async fn test_write_replaces_previous_directory() {
        let fx = fixture();
        let store = JobStore::new();
        let job = job_for(&fx, "resnet");

        store.write(&job).await.unwrap();
        std::fs::write(job.job_dir.join("stale.txt"), "old").unwrap();
        store.write(&job).await.unwrap();

        assert!(!job.job_dir.join("stale.txt").exists());
        assert!(job.snapshot_dir().join("train.py").exists());
    }

    #[tokio::test]
    async fn test_linked_sources_are_copied_not_shared() {
        let fx = fixture();
        let shared = fx.tmp.path().join("shared");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("utils.py"), "V = 1\n").unwrap();
        std::os::unix::fs::symlink(shared.join("utils.py"), fx.code.join("utils.py")).unwrap();
        std::os::unix::fs::symlink("../shared", fx.code.join("lib")).unwrap();
        let store = JobStore::new();
        let job = job_for(&fx, "linked");

        store.write(&job).await.unwrap();
        std::fs::write(shared.join("utils.py"), "V = 2\n").unwrap();

        let snapshot = job.snapshot_dir();
        for copy in [snapshot.join("utils.py"), snapshot.join("lib").join("utils.py")] {
            assert!(!std::fs::symlink_metadata(&copy).unwrap().file_type().is_symlink());
            assert_eq!(std::fs::read_to_string(&copy).unwrap(), "V = 1\n");
        }
    }

    #[tokio::test]
    async fn test_link_cycle_is_copied_once() {
        let fx = fixture();
        std::os::unix::fs::symlink("..", fx.code.join("models").join("up")).unwrap();
        let store = JobStore::new();
        let job = job_for(&fx, "cycle");

        store.write(&job).await.unwrap();

        let snapshot = job.snapshot_dir();
        assert!(snapshot.join("models").join("net.py").is_file());
        assert!(!snapshot.join("models").join("up").join("models").exists());
    }

    #[tokio::test]
    async fn test_dangling_link_fails_write() {
        let fx = fixture();
        std::os::unix::fs::symlink("missing.py", fx.code.join("broken.py")).unwrap();
        let store = JobStore::new();

        let err = store.write(&job_for(&fx, "dangling")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_single_file_code_source() {
        let fx = fixture();
        let store = JobStore::new();
        let mut job = job_for(&fx, "script");
        job.code_dir = fx.code.join("train.py");

        store.write(&job).await.unwrap();

        assert!(job.snapshot_dir().join("train.py").is_file());
    }

    #[tokio::test]
    async fn test_missing_code_source_fails_write() {
        let fx = fixture();
        let store = JobStore::new();
        let mut job = job_for(&fx, "ghost");
        job.code_dir = fx.code.join("does-not-exist");

        let err = store.write(&job).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_missing_directory_is_not_found() {
        let fx = fixture();
        let store = JobStore::new();

        let err = store.read(&fx.queue.join("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_without_status_is_not_found() {
        let fx = fixture();
        let store = JobStore::new();
        let job = job_for(&fx, "resnet");

        store.write(&job).await.unwrap();
        std::fs::remove_file(job.status_file()).unwrap();

        let err = store.read(&job.job_dir).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_config_missing_field_is_parse_error() {
        let fx = fixture();
        let store = JobStore::new();
        let job = job_for(&fx, "resnet");

        store.write(&job).await.unwrap();
        let config = std::fs::read_to_string(job.config_file()).unwrap();
        let trimmed: String = config
            .lines()
            .filter(|line| !line.starts_with("gpus:"))
            .map(|line| format!("{line}\n"))
            .collect();
        std::fs::write(job.config_file(), trimmed).unwrap();

        let err = store.read(&job.job_dir).await.unwrap_err();
        assert!(matches!(err, QueueError::ParseError { .. }));
    }

    #[tokio::test]
    async fn test_status_overwrite_is_last_write_wins() {
        let fx = fixture();
        let store = JobStore::new();
        let job = job_for(&fx, "resnet");

        store.write(&job).await.unwrap();
        store.write_status(&job.job_dir, JobStatus::Crashed).await.unwrap();
        store.write_status(&job.job_dir, JobStatus::Ready).await.unwrap();
        store.write_status(&job.job_dir, JobStatus::Finished).await.unwrap();

        assert_eq!(store.read_status(&job.job_dir).await.unwrap(), JobStatus::Finished);
    }
}
