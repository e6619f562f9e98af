//! Error types for the watch pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watch registration and event normalization.
///
/// Nothing here is fatal to the engine loop: registration errors are
/// reported and skipped, stale handles are dropped, and the loop keeps
/// running against a partially accessible filesystem.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watch path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    #[error("watch path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("notification backend error: {reason}")]
    Backend { reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::Backend {
            reason: e.to_string(),
        }
    }
}
