//! Download scheduler draining pending catalog links with bounded parallelism.
//!
//! # Concurrency Model
//!
//! - Each link runs in its own Tokio task
//! - A semaphore permit is acquired before spawning each task, so at most
//!   `max_parallel` external downloader processes exist at any time
//! - Permits are released when the task ends (RAII)
//! - Every catalog write touches a single link row; jobs never share a
//!   transaction
//! - Jobs targeting the same episode file hold a per-file lock, so a second
//!   link of a finished episode is skipped instead of replacing the file
//! - A job task that panics is counted as failed and its link marked Failed
//!
//! # Cancellation
//!
//! The interrupt flag is checked before each job is started. Jobs already
//! running are left to finish or hit their timeout.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::downloader::{DEFAULT_QUALITY, ExternalDownloader};
use super::error::{DownloadFailure, FailureKind, MAX_PARALLEL, MIN_PARALLEL, SchedulerError};
use super::filename::EpisodeTarget;
use super::task::{JobOutcome, JobSettings, TargetLocks, run_job};
use crate::catalog::{CatalogRepository, DownloadStatus, PendingLinkFilter};

/// Default number of simultaneous downloads.
pub const DEFAULT_PARALLEL: usize = 2;

/// Default download directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./Downloads";

/// What to download and where.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Restricts the pending links by series/season/episode.
    pub filter: PendingLinkFilter,
    /// Root of the `<Series>/Season NN/` tree.
    pub output_dir: PathBuf,
    /// Format selector passed to the downloader.
    pub quality: String,
    /// Re-download when the final file already exists.
    pub overwrite_existing: bool,
}

impl Default for DownloadRequest {
    fn default() -> Self {
        Self {
            filter: PendingLinkFilter::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            quality: DEFAULT_QUALITY.to_string(),
            overwrite_existing: false,
        }
    }
}

/// Live counters for a run, shared with every job.
#[derive(Debug, Default)]
pub struct DownloadStats {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Links downloaded and moved into place.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Links marked Failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Links whose final file already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Jobs finished so far.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.succeeded() + self.failed() + self.skipped()
    }

    fn record(&self, outcome: &JobOutcome) {
        let counter = match outcome {
            JobOutcome::Succeeded { .. } => &self.succeeded,
            JobOutcome::Skipped { .. } => &self.skipped,
            JobOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn record_panic(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Summary of a download run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadResult {
    /// Pending links selected by the filter.
    pub total: usize,
    /// Links downloaded.
    pub succeeded: usize,
    /// Links that failed.
    pub failed: usize,
    /// Links whose file already existed.
    pub skipped: usize,
    /// One entry per failed link.
    pub errors: Vec<DownloadFailure>,
    /// Successful downloads per requested quality.
    pub quality_breakdown: BTreeMap<String, usize>,
    /// The run stopped starting jobs because of an interrupt.
    pub interrupted: bool,
    /// Wall-clock duration.
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl DownloadResult {
    /// Links never started because of an interrupt.
    #[must_use]
    pub fn not_started(&self) -> usize {
        self.total
            .saturating_sub(self.succeeded + self.failed + self.skipped)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// Drains pending links through an [`ExternalDownloader`].
pub struct DownloadScheduler {
    downloader: Arc<dyn ExternalDownloader>,
    semaphore: Arc<Semaphore>,
    target_locks: Arc<TargetLocks>,
    max_parallel: usize,
}

impl std::fmt::Debug for DownloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadScheduler")
            .field("downloader", &self.downloader.name())
            .field("max_parallel", &self.max_parallel)
            .finish_non_exhaustive()
    }
}

impl DownloadScheduler {
    /// Creates a scheduler running at most `max_parallel` downloads at once.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidParallelism`] outside 1..=100.
    #[instrument(level = "debug", skip(downloader), fields(downloader = downloader.name()))]
    pub fn new(
        downloader: Arc<dyn ExternalDownloader>,
        max_parallel: usize,
    ) -> Result<Self, SchedulerError> {
        if !(MIN_PARALLEL..=MAX_PARALLEL).contains(&max_parallel) {
            return Err(SchedulerError::InvalidParallelism {
                value: max_parallel,
            });
        }

        Ok(Self {
            downloader,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
            target_locks: Arc::new(TargetLocks::default()),
            max_parallel,
        })
    }

    /// Configured parallelism.
    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Downloads every pending link matching the request.
    ///
    /// # Errors
    ///
    /// Fails only when the pending links cannot be read; per-link failures
    /// are reported in the result.
    pub async fn start_downloads<R>(
        &self,
        catalog: &R,
        request: &DownloadRequest,
    ) -> Result<DownloadResult, SchedulerError>
    where
        R: CatalogRepository + Clone + 'static,
    {
        self.start_downloads_interruptible(
            catalog,
            request,
            Arc::new(AtomicBool::new(false)),
            Arc::new(DownloadStats::new()),
        )
        .await
    }

    /// Like [`start_downloads`](Self::start_downloads), stopping before the
    /// next job once `interrupted` is set. `stats` is updated live.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Catalog`] when pending links cannot be read,
    /// [`SchedulerError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(
        skip(self, catalog, request, interrupted, stats),
        fields(output_dir = %request.output_dir.display(), max_parallel = self.max_parallel)
    )]
    pub async fn start_downloads_interruptible<R>(
        &self,
        catalog: &R,
        request: &DownloadRequest,
        interrupted: Arc<AtomicBool>,
        stats: Arc<DownloadStats>,
    ) -> Result<DownloadResult, SchedulerError>
    where
        R: CatalogRepository + Clone + 'static,
    {
        let started = Instant::now();
        let pending = catalog.get_pending_download_links(&request.filter).await?;
        let total = pending.len();
        info!(total, "starting downloads");

        let settings = Arc::new(JobSettings {
            output_dir: request.output_dir.clone(),
            quality: request.quality.clone(),
            overwrite_existing: request.overwrite_existing,
            target_locks: Arc::clone(&self.target_locks),
        });

        let mut handles = Vec::with_capacity(total);
        let mut was_interrupted = false;

        for item in pending {
            if interrupted.load(Ordering::SeqCst) {
                info!(started = handles.len(), total, "interrupt received; not starting further downloads");
                was_interrupted = true;
                break;
            }

            // Blocks while max_parallel jobs are running
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::SemaphoreClosed)?;

            if interrupted.load(Ordering::SeqCst) {
                was_interrupted = true;
                break;
            }

            debug!(link_id = item.link.id, url = %item.link.url, "scheduling download");

            let link_id = item.link.id;
            let file_name = format!(
                "{}.mp4",
                EpisodeTarget::new(
                    &request.output_dir,
                    &item.series_name,
                    item.season_number,
                    item.episode_number,
                )
                .file_stem
            );

            let catalog = catalog.clone();
            let downloader = Arc::clone(&self.downloader);
            let settings = Arc::clone(&settings);
            let stats = Arc::clone(&stats);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = run_job(&catalog, downloader.as_ref(), &item, &settings).await;
                stats.record(&outcome);
                outcome
            });
            handles.push((link_id, file_name, handle));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        let mut result = DownloadResult {
            total,
            interrupted: was_interrupted,
            ..DownloadResult::default()
        };

        for (link_id, file_name, handle) in handles {
            match handle.await {
                Ok(JobOutcome::Succeeded { .. }) => {
                    result.succeeded += 1;
                    *result
                        .quality_breakdown
                        .entry(request.quality.clone())
                        .or_default() += 1;
                }
                Ok(JobOutcome::Skipped { .. }) => result.skipped += 1,
                Ok(JobOutcome::Failed(failure)) => {
                    result.failed += 1;
                    result.errors.push(failure);
                }
                Err(e) => {
                    warn!(link_id, error = %e, "download task panicked");
                    stats.record_panic();
                    let message = format!("download task panicked: {e}");
                    if let Err(e) = catalog
                        .update_link_download_status(
                            link_id,
                            DownloadStatus::Failed,
                            Some(&message),
                            None,
                        )
                        .await
                    {
                        warn!(link_id, error = %e, "failed to mark link failed");
                    }
                    result.failed += 1;
                    result.errors.push(DownloadFailure {
                        link_id,
                        file_name,
                        kind: FailureKind::TaskPanic,
                        message,
                    });
                }
            }
        }

        result.duration = started.elapsed();
        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            total,
            interrupted = result.interrupted,
            "downloads complete"
        );
        Ok(result)
    }
}
