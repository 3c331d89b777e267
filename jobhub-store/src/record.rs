//! Text records kept in a job directory
//!
//! Both records are `key: value` lines. Fields are matched by name, so the
//! line order is irrelevant when reading; writers always emit the fields in
//! the documented order:
//!
//! ```text
//! code_dir: /home/me/project
//! data_dir: /mnt/datasets/imagenet
//! cmd: python train.py --epochs 90
//! time: 2024-03-01T09:30:00.123456Z
//! gpus: 0,1
//! ```
//!
//! An optional `version` field may be present; only version 1 is accepted.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use jobhub_core::domain::job::{Job, JobStatus, UnknownStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{QueueError, Result};

/// Record schema understood by this crate
pub const SCHEMA_VERSION: u32 = 1;

const VERSION: &str = "version";
const CODE_DIR: &str = "code_dir";
const DATA_DIR: &str = "data_dir";
const CMD: &str = "cmd";
const TIME: &str = "time";
const GPUS: &str = "gpus";
const STATUS: &str = "status";

const NO_GPUS: &str = "none";

/// Timestamp layout written by earlier versions of the queue
const LEGACY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Contents of `config.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub code_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cmd: String,
    pub submitted_at: DateTime<Utc>,
    pub gpus: Option<Vec<u32>>,
}

impl ConfigRecord {
    pub fn from_job(job: &Job) -> Self {
        Self {
            code_dir: job.code_dir.clone(),
            data_dir: job.data_dir.clone(),
            cmd: job.cmd.clone(),
            submitted_at: job.submitted_at,
            gpus: job.gpus.clone(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{CODE_DIR}: {}\n{DATA_DIR}: {}\n{CMD}: {}\n{TIME}: {}\n{GPUS}: {}\n",
            self.code_dir.display(),
            self.data_dir.display(),
            self.cmd,
            format_time(&self.submitted_at),
            format_gpus(self.gpus.as_deref()),
        )
    }

    /// Parses the record read from `file`
    pub fn parse(file: &Path, text: &str) -> Result<Self> {
        let mut fields = parse_fields(file, text, &[CODE_DIR, DATA_DIR, CMD, TIME, GPUS])?;
        let mut take = |key: &str| {
            fields
                .remove(key)
                .ok_or_else(|| QueueError::parse(file, format!("missing field `{key}`")))
        };

        let code_dir = PathBuf::from(take(CODE_DIR)?);
        let data_dir = PathBuf::from(take(DATA_DIR)?);
        let cmd = take(CMD)?.to_string();
        let time = take(TIME)?;
        let gpus = take(GPUS)?;

        if cmd.trim().is_empty() {
            return Err(QueueError::parse(file, "field `cmd` is empty"));
        }

        Ok(Self {
            code_dir,
            data_dir,
            cmd,
            submitted_at: parse_time(time.trim()).map_err(|reason| QueueError::parse(file, reason))?,
            gpus: parse_gpus(gpus.trim()).map_err(|reason| QueueError::parse(file, reason))?,
        })
    }
}

/// Contents of `status.txt`
pub fn render_status(status: JobStatus) -> String {
    format!("{STATUS}: {status}\n")
}

pub fn parse_status(file: &Path, text: &str) -> Result<JobStatus> {
    let mut fields = parse_fields(file, text, &[STATUS])?;
    let value = fields
        .remove(STATUS)
        .ok_or_else(|| QueueError::parse(file, format!("missing field `{STATUS}`")))?;

    value
        .parse()
        .map_err(|e: UnknownStatus| QueueError::parse(file, e.to_string()))
}

/// Splits `key: value` lines, rejecting unknown and repeated keys
///
/// Blank lines are ignored. The optional `version` field is checked here
/// and never returned.
fn parse_fields<'a>(
    file: &Path,
    text: &'a str,
    allowed: &[&str],
) -> Result<HashMap<&'a str, &'a str>> {
    let mut fields = HashMap::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or_else(|| {
            QueueError::parse(file, format!("line {} is not a `key: value` pair", idx + 1))
        })?;
        let key = key.trim();
        // Only the separator space is dropped; commands and paths keep any
        // other surrounding whitespace.
        let value = value.strip_prefix(' ').unwrap_or(value);

        if key == VERSION {
            check_version(file, value.trim())?;
            continue;
        }

        if !allowed.contains(&key) {
            return Err(QueueError::parse(file, format!("unknown field `{key}`")));
        }

        if fields.insert(key, value).is_some() {
            return Err(QueueError::parse(file, format!("field `{key}` appears twice")));
        }
    }

    Ok(fields)
}

fn check_version(file: &Path, value: &str) -> Result<()> {
    match value.parse::<u32>() {
        Ok(SCHEMA_VERSION) => Ok(()),
        Ok(other) => Err(QueueError::parse(
            file,
            format!("unsupported record version {other} (expected {SCHEMA_VERSION})"),
        )),
        Err(_) => Err(QueueError::parse(file, format!("invalid record version '{value}'"))),
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, LEGACY_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| format!("invalid timestamp '{value}'"))
}

fn format_gpus(gpus: Option<&[u32]>) -> String {
    match gpus {
        None => NO_GPUS.to_string(),
        Some(ids) => ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Parses `none` or a comma-joined id list; empty items are skipped
pub fn parse_gpus(value: &str) -> std::result::Result<Option<Vec<u32>>, String> {
    if value == NO_GPUS {
        return Ok(None);
    }

    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<u32>()
                .map_err(|_| format!("invalid gpu id '{item}'"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(Some)
}
