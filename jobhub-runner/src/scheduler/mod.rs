//! Scheduler layer for the runner
//!
//! Polls the queue for the oldest ready job, hands it to the execution
//! service and records the outcome.

pub mod poller;

pub use poller::JobRunner;
