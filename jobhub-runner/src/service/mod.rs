//! Service layer
//!
//! Services launch and supervise job processes. They are trait-based so the
//! scheduler can be exercised without spawning real processes.

mod execution;

pub use execution::{ExecutionService, ProcessExecutionService, ensure_data_binding};
