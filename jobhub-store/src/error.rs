//! Error types for the queue store

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors that can occur while reading or mutating the queue
#[derive(Debug, Error)]
pub enum QueueError {
    /// Job directory or one of its records is missing
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A record exists but a required field is missing or malformed
    #[error("Failed to parse {}: {reason}", .file.display())]
    ParseError { file: PathBuf, reason: String },

    /// The add request cannot be turned into a job
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Any other filesystem failure
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl QueueError {
    pub(crate) fn parse(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O error on `path`, turning a missing file into `NotFound`
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
