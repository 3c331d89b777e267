//! On-disk layout of a job directory
//!
//! Every job owns one directory under the queue root, named after the job:
//!
//! ```text
//! <queue root>/<job name>/
//!     config.txt
//!     status.txt
//!     snapshot/
//!     output.txt
//! ```

/// Config record with code path, data path, command, time and GPU list
pub const CONFIG_FILE: &str = "config.txt";

/// Status record holding a single status line
pub const STATUS_FILE: &str = "status.txt";

/// Copy of the code tree taken at submission time
pub const SNAPSHOT_DIR: &str = "snapshot";

/// Combined process output captured during the last run
pub const OUTPUT_FILE: &str = "output.txt";
