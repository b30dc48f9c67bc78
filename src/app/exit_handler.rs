//! Exit code logic for the harvester process.
//!
//! Single responsibility: map command results to the process exit outcome.

use harvester_core::{DownloadResult, StopReason, TraversalResult};

use crate::ProcessExit;

/// Downloads succeed when nothing failed and the run was not interrupted.
pub(crate) fn download_exit(result: &DownloadResult) -> ProcessExit {
    if result.failed == 0 && !result.interrupted {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    }
}

/// A traversal succeeds unless it was cancelled; reaching the error
/// threshold is the normal end of a series.
pub(crate) fn traversal_exit(result: &TraversalResult) -> ProcessExit {
    if result.stop_reason == Some(StopReason::Cancelled) {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
