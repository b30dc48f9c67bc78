//! The per-link download job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::downloader::ExternalDownloader;
use super::error::{DownloadFailure, FailureKind};
use super::filename::{
    EpisodeTarget, find_temp_output, output_extension, temp_stem, temp_template,
};
use crate::catalog::{CatalogRepository, DownloadStatus, PendingDownload};

/// How one link job ended.
#[derive(Debug)]
pub(crate) enum JobOutcome {
    /// Downloaded and moved into place.
    Succeeded { path: PathBuf },
    /// Final file already present; downloader not invoked.
    Skipped { path: PathBuf },
    /// Recorded as Failed on the link.
    Failed(DownloadFailure),
}

/// Settings shared by every job of a run.
#[derive(Debug, Clone)]
pub(crate) struct JobSettings {
    pub output_dir: PathBuf,
    pub quality: String,
    pub overwrite_existing: bool,
    pub target_locks: Arc<TargetLocks>,
}

/// One lock per final episode file. Jobs for the same episode run their
/// check, download and move one at a time.
#[derive(Debug, Default)]
pub(crate) struct TargetLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl TargetLocks {
    fn lock_for(&self, target: &EpisodeTarget) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(target.season_dir.join(&target.file_stem))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }
}

struct JobError {
    kind: FailureKind,
    message: String,
}

impl JobError {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn filesystem(action: &str, path: &Path, error: &std::io::Error) -> Self {
        Self::new(
            FailureKind::Filesystem,
            format!("failed to {action} {}: {error}", path.display()),
        )
    }
}

/// Runs one link through target resolution, download, output move and
/// status recording.
#[instrument(
    skip(catalog, downloader, pending, settings),
    fields(link_id = pending.link.id, season = pending.season_number, episode = pending.episode_number)
)]
pub(crate) async fn run_job<R>(
    catalog: &R,
    downloader: &dyn ExternalDownloader,
    pending: &PendingDownload,
    settings: &JobSettings,
) -> JobOutcome
where
    R: CatalogRepository + ?Sized,
{
    let link_id = pending.link.id;
    let target = EpisodeTarget::new(
        &settings.output_dir,
        &pending.series_name,
        pending.season_number,
        pending.episode_number,
    );

    let target_lock = settings.target_locks.lock_for(&target);
    let _guard = target_lock.lock().await;

    match download_link(catalog, downloader, pending, settings, &target).await {
        Ok(outcome) => {
            if let JobOutcome::Succeeded { path } | JobOutcome::Skipped { path } = &outcome {
                let path_text = path.display().to_string();
                // Best-effort: the file is in place either way
                if let Err(e) = catalog
                    .update_link_download_status(
                        link_id,
                        DownloadStatus::Completed,
                        None,
                        Some(&path_text),
                    )
                    .await
                {
                    warn!(link_id, error = %e, "failed to mark link completed");
                }
            }
            outcome
        }
        Err(error) => {
            warn!(link_id, kind = %error.kind, error = %error.message, "download failed");
            if let Err(e) = catalog
                .update_link_download_status(
                    link_id,
                    DownloadStatus::Failed,
                    Some(&error.message),
                    None,
                )
                .await
            {
                warn!(link_id, error = %e, "failed to mark link failed");
            }
            JobOutcome::Failed(DownloadFailure {
                link_id,
                file_name: format!("{}.mp4", target.file_stem),
                kind: error.kind,
                message: error.message,
            })
        }
    }
}

async fn download_link<R>(
    catalog: &R,
    downloader: &dyn ExternalDownloader,
    pending: &PendingDownload,
    settings: &JobSettings,
    target: &EpisodeTarget,
) -> Result<JobOutcome, JobError>
where
    R: CatalogRepository + ?Sized,
{
    let link = &pending.link;

    if !settings.overwrite_existing {
        let existing = target
            .existing_final_file()
            .await
            .map_err(|e| JobError::filesystem("inspect", &target.season_dir, &e))?;
        if let Some(path) = existing {
            info!(link_id = link.id, path = %path.display(), "file exists; skipping");
            return Ok(JobOutcome::Skipped { path });
        }
    }

    tokio::fs::create_dir_all(&target.season_dir)
        .await
        .map_err(|e| JobError::filesystem("create", &target.season_dir, &e))?;

    catalog
        .update_link_download_status(link.id, DownloadStatus::Downloading, None, None)
        .await
        .map_err(|e| {
            JobError::new(
                FailureKind::Catalog,
                format!("failed to mark link downloading: {e}"),
            )
        })?;

    let stem = temp_stem(link.id);
    let template = temp_template(&target.season_dir, &stem);
    debug!(link_id = link.id, url = %link.url, template = %template.display(), "invoking downloader");

    downloader
        .download(&link.url, &template, &settings.quality)
        .await
        .map_err(|e| JobError::new(FailureKind::from(&e), e.to_string()))?;

    let produced = find_temp_output(&target.season_dir, &stem)
        .await
        .map_err(|e| JobError::filesystem("scan", &target.season_dir, &e))?
        .ok_or_else(|| {
            JobError::new(
                FailureKind::OutputMissing,
                format!(
                    "{} reported success but no output file matched {stem}.*",
                    downloader.name()
                ),
            )
        })?;

    // Another process may have placed the file while yt-dlp ran
    if !settings.overwrite_existing
        && let Some(path) = target
            .existing_final_file()
            .await
            .map_err(|e| JobError::filesystem("inspect", &target.season_dir, &e))?
    {
        info!(link_id = link.id, path = %path.display(), "file appeared during download; keeping it");
        if let Err(e) = tokio::fs::remove_file(&produced).await {
            warn!(path = %produced.display(), error = %e, "failed to remove temporary output");
        }
        return Ok(JobOutcome::Skipped { path });
    }

    let final_path = target.final_path(&output_extension(&produced));
    tokio::fs::rename(&produced, &final_path)
        .await
        .map_err(|e| JobError::filesystem("move output to", &final_path, &e))?;

    info!(link_id = link.id, path = %final_path.display(), "download completed");
    Ok(JobOutcome::Succeeded { path: final_path })
}
