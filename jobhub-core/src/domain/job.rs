//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::layout::{CONFIG_FILE, OUTPUT_FILE, SNAPSHOT_DIR, STATUS_FILE};

/// A queued compute job
///
/// A job is fully determined by its directory under the queue root. The
/// directory name is the job name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique name, also the directory name under the queue root
    pub name: String,

    /// Directory that owns the snapshot, records and captured output
    pub job_dir: PathBuf,

    /// Absolute path of the code tree copied at submission time
    pub code_dir: PathBuf,

    /// Absolute path of the external data source (linked, never copied)
    pub data_dir: PathBuf,

    /// Command line handed to the shell as-is
    pub cmd: String,

    /// GPU device ids exposed to the process; `None` leaves visibility alone
    pub gpus: Option<Vec<u32>>,

    pub submitted_at: DateTime<Utc>,

    pub status: JobStatus,
}

impl Job {
    pub fn snapshot_dir(&self) -> PathBuf {
        self.job_dir.join(SNAPSHOT_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.job_dir.join(CONFIG_FILE)
    }

    pub fn status_file(&self) -> PathBuf {
        self.job_dir.join(STATUS_FILE)
    }

    pub fn output_file(&self) -> PathBuf {
        self.job_dir.join(OUTPUT_FILE)
    }

    /// Final path component of the data source
    ///
    /// Entries with this name are left out of the snapshot and the data
    /// link inside the snapshot carries it.
    pub fn data_dir_name(&self) -> Option<&OsStr> {
        self.data_dir.file_name()
    }

    /// Location of the data link inside the snapshot
    pub fn data_link(&self) -> Option<PathBuf> {
        self.data_dir_name().map(|name| self.snapshot_dir().join(name))
    }
}

/// Persisted lifecycle state of a job
///
/// There is no running state: a job being executed still reads `ready`
/// until the runner records the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ready,
    Finished,
    Crashed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 3] = [JobStatus::Ready, JobStatus::Finished, JobStatus::Crashed];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Ready => "ready",
            JobStatus::Finished => "finished",
            JobStatus::Crashed => "crashed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown status '{}' (expected ready, finished or crashed)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ready" => Ok(JobStatus::Ready),
            "finished" => Ok(JobStatus::Finished),
            "crashed" => Ok(JobStatus::Crashed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Selects jobs by status for listing and removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(JobStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: JobStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        StatusFilter::Only(JobStatus::Ready)
    }
}

impl From<JobStatus> for StatusFilter {
    fn from(status: JobStatus) -> Self {
        StatusFilter::Only(status)
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => status.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job {
            name: "train".to_string(),
            job_dir: PathBuf::from("/queue/train"),
            code_dir: PathBuf::from("/home/me/project"),
            data_dir: PathBuf::from("/mnt/datasets/imagenet"),
            cmd: "python train.py".to_string(),
            gpus: Some(vec![0, 1]),
            submitted_at: Utc::now(),
            status: JobStatus::Ready,
        }
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in JobStatus::ALL {
            assert_eq!(status.to_string().parse::<JobStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "running".parse::<JobStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("running".to_string()));
        assert!(err.to_string().contains("running"));
    }

    #[test]
    fn test_status_filter_parsing() {
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!(
            "finished".parse::<StatusFilter>(),
            Ok(StatusFilter::Only(JobStatus::Finished))
        );
        assert!("bogus".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_status_filter_matches() {
        assert!(StatusFilter::All.matches(JobStatus::Crashed));
        assert!(StatusFilter::Only(JobStatus::Ready).matches(JobStatus::Ready));
        assert!(!StatusFilter::Only(JobStatus::Ready).matches(JobStatus::Finished));
        assert_eq!(StatusFilter::default(), StatusFilter::Only(JobStatus::Ready));
    }

    #[test]
    fn test_job_paths() {
        let job = sample_job();
        assert_eq!(job.snapshot_dir(), PathBuf::from("/queue/train/snapshot"));
        assert_eq!(job.config_file(), PathBuf::from("/queue/train/config.txt"));
        assert_eq!(job.status_file(), PathBuf::from("/queue/train/status.txt"));
        assert_eq!(job.output_file(), PathBuf::from("/queue/train/output.txt"));
        assert_eq!(job.data_dir_name(), Some(OsStr::new("imagenet")));
        assert_eq!(
            job.data_link(),
            Some(PathBuf::from("/queue/train/snapshot/imagenet"))
        );
    }

    #[test]
    fn test_root_data_dir_has_no_link() {
        let mut job = sample_job();
        job.data_dir = PathBuf::from("/");
        assert_eq!(job.data_link(), None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Crashed).unwrap();
        assert_eq!(json, "\"crashed\"");
    }
}
