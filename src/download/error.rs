//! Error types for the download scheduler.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::downloader::DownloaderError;
use crate::catalog::CatalogError;

/// Minimum allowed parallelism.
pub const MIN_PARALLEL: usize = 1;

/// Maximum allowed parallelism.
pub const MAX_PARALLEL: usize = 100;

/// Errors that stop a whole download run.
///
/// Per-link failures never surface here; they are recorded in
/// [`DownloadResult::errors`](super::DownloadResult::errors).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid parallelism value provided.
    #[error(
        "invalid parallelism {value}: must be between {MIN_PARALLEL} and {MAX_PARALLEL}\n  Suggestion: Pass --parallel with a value in range"
    )]
    InvalidParallelism {
        /// The rejected value.
        value: usize,
    },

    /// Reading pending links failed.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Distinct ways a single link download can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Downloader exited non-zero.
    ProcessExit,
    /// Downloader could not be started.
    ProcessSpawn,
    /// Downloader reported success but no output file matched.
    OutputMissing,
    /// Downloader exceeded the per-download ceiling.
    Timeout,
    /// Creating directories or moving the output failed.
    Filesystem,
    /// The link's status could not be recorded.
    Catalog,
    /// The job task panicked.
    TaskPanic,
}

impl FailureKind {
    /// Stable label for logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProcessExit => "process_exit",
            Self::ProcessSpawn => "process_spawn",
            Self::OutputMissing => "output_missing",
            Self::Timeout => "timeout",
            Self::Filesystem => "filesystem",
            Self::Catalog => "catalog",
            Self::TaskPanic => "task_panic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&DownloaderError> for FailureKind {
    fn from(error: &DownloaderError) -> Self {
        match error {
            DownloaderError::Spawn { .. } => Self::ProcessSpawn,
            DownloaderError::NonZeroExit { .. } | DownloaderError::Wait(_) => Self::ProcessExit,
            DownloaderError::Timeout { .. } => Self::Timeout,
        }
    }
}

/// One failed link in a download run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadFailure {
    /// Link that failed.
    pub link_id: i64,
    /// Final file name the link was meant to produce.
    pub file_name: String,
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable detail, also stored on the link.
    pub message: String,
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.file_name, self.kind, self.message)
    }
}
