//! Jobhub queue store
//!
//! Directory-backed storage for the jobhub queue. Each job lives in its own
//! directory under the queue root, holding a snapshot of the code tree, a
//! config record, a status record and the captured output of its last run.
//!
//! [`JobQueue`] is the entry point: it keeps the in-memory index of the
//! queue, serializes every read and write behind one lock, and exposes the
//! add/remove/list operations. [`JobStore`] handles the records of a single
//! job and is used by the queue.
//!
//! # Example
//!
//! ```no_run
//! use jobhub_core::dto::job::CreateJob;
//! use jobhub_store::JobQueue;
//!
//! #[tokio::main]
//! async fn main() -> jobhub_store::Result<()> {
//!     let queue = JobQueue::open("jobs").await?;
//!     let job = queue
//!         .add(CreateJob::new("~/project", "~/datasets/mnist", "python train.py").with_gpus(vec![0]))
//!         .await?;
//!
//!     println!("Queued {}", job.name);
//!     Ok(())
//! }
//! ```

pub mod error;
mod queue;
pub mod record;
mod store;

pub use error::{QueueError, Result};
pub use queue::{JobQueue, RemoveTarget, ScanReport, SkippedJob};
pub use store::JobStore;
