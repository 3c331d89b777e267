//! Job DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request to add a job to the queue
///
/// Paths may be relative or start with `~`; the store resolves them to
/// absolute paths before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Job name; a unique one is generated when absent
    pub name: Option<String>,
    pub code_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cmd: String,
    pub gpus: Option<Vec<u32>>,
    /// Submission time; defaults to now
    pub submitted_at: Option<DateTime<Utc>>,
}

impl CreateJob {
    pub fn new(
        code_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
        cmd: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            code_dir: code_dir.into(),
            data_dir: data_dir.into(),
            cmd: cmd.into(),
            gpus: None,
            submitted_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_gpus(mut self, gpus: Vec<u32>) -> Self {
        self.gpus = Some(gpus);
        self
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(at);
        self
    }
}
