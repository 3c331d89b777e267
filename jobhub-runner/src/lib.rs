//! Jobhub Runner
//!
//! Executes queued jobs one at a time.
//!
//! Architecture:
//! - Configuration: queue location, poll interval and execution policy
//! - Services: launching a job's command and capturing its output
//! - Scheduler: the polling loop that picks the oldest ready job and records
//!   its outcome
//!
//! Only one runner should consume a queue directory; nothing enforces this.

pub mod config;
pub mod execution;
pub mod scheduler;
pub mod service;

pub use config::Config;
pub use execution::{ExecutionError, RunOutcome, RunReport};
pub use scheduler::JobRunner;
pub use service::{ExecutionService, ProcessExecutionService};
