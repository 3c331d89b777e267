//! Runner configuration
//!
//! Defines where the queue lives, how often it is polled and how job
//! outcomes are classified.

use std::path::PathBuf;
use std::time::Duration;

/// Default queue root, relative to the working directory
pub const DEFAULT_QUEUE_DIR: &str = "jobs";

/// Variable that restricts which GPUs a job can see
pub const DEFAULT_GPU_ENV_VAR: &str = "CUDA_VISIBLE_DEVICES";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one subdirectory per job
    pub queue_dir: PathBuf,

    /// Pause between queue scans
    pub poll_interval: Duration,

    /// Environment variable set to a job's GPU list
    pub gpu_env_var: String,

    /// Mirror job output to the runner's stdout as well as `output.txt`
    pub echo_output: bool,

    /// Record a completed run with a non-zero exit code as crashed
    pub nonzero_exit_is_crash: bool,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue_dir: queue_dir.into(),
            poll_interval: Duration::from_secs(1),
            gpu_env_var: DEFAULT_GPU_ENV_VAR.to_string(),
            echo_output: true,
            nonzero_exit_is_crash: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised variables, all optional:
    /// - JOBHUB_QUEUE_DIR (default: jobs)
    /// - JOBHUB_POLL_INTERVAL (seconds, default: 1)
    /// - JOBHUB_GPU_ENV_VAR (default: CUDA_VISIBLE_DEVICES)
    /// - JOBHUB_ECHO_OUTPUT (true/false, default: true)
    /// - JOBHUB_NONZERO_EXIT_CRASHES (true/false, default: false)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::new(DEFAULT_QUEUE_DIR);

        let queue_dir = lookup("JOBHUB_QUEUE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.queue_dir);

        let poll_interval = match lookup("JOBHUB_POLL_INTERVAL") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    anyhow::anyhow!("JOBHUB_POLL_INTERVAL must be whole seconds, got '{}'", raw)
                })?,
            None => defaults.poll_interval,
        };

        let gpu_env_var = lookup("JOBHUB_GPU_ENV_VAR").unwrap_or(defaults.gpu_env_var);

        let echo_output = match lookup("JOBHUB_ECHO_OUTPUT") {
            Some(raw) => parse_flag("JOBHUB_ECHO_OUTPUT", &raw)?,
            None => defaults.echo_output,
        };

        let nonzero_exit_is_crash = match lookup("JOBHUB_NONZERO_EXIT_CRASHES") {
            Some(raw) => parse_flag("JOBHUB_NONZERO_EXIT_CRASHES", &raw)?,
            None => defaults.nonzero_exit_is_crash,
        };

        Ok(Self {
            queue_dir,
            poll_interval,
            gpu_env_var,
            echo_output,
            nonzero_exit_is_crash,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_dir.as_os_str().is_empty() {
            anyhow::bail!("queue_dir cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.gpu_env_var.is_empty() || self.gpu_env_var.contains(['=', '\0']) {
            anyhow::bail!("gpu_env_var '{}' is not a valid variable name", self.gpu_env_var);
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DIR)
    }
}

fn parse_flag(key: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false, got '{}'", key, raw),
    }
}
